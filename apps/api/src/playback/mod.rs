// Playback: the receipt state machine, its timers, and the HTTP handlers.
// The controller is timer-free; `Session` owns scheduling and cancellation.

pub mod controller;
pub mod handlers;
pub mod session;

pub use session::Session;
