// Face gating: the detection collaborator boundary and the two-face rule.
// All detector calls go through the `FaceDetector` trait; handlers never talk to
// the detection service directly.

pub mod detector;
pub mod gate;
pub mod remote;

pub use detector::{FaceDetector, UnavailableDetector};
pub use gate::GateRejection;
pub use remote::RemoteFaceDetector;
