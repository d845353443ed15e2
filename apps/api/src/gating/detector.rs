//! Face detection — pluggable, trait-based collaborator that counts faces in a photo.
//!
//! Default: `RemoteFaceDetector` when `FACE_DETECTION_URL` is set, otherwise
//! `UnavailableDetector`. `AppState` holds an `Arc<dyn FaceDetector>`.

use async_trait::async_trait;
use thiserror::Error;

use crate::receipt::ReceiptImage;

#[derive(Debug, Error)]
pub enum DetectionError {
    /// The engine could not be loaded or reached.
    #[error("face detection engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran but the call failed, e.g. on a malformed image.
    #[error("face detection call failed: {0}")]
    CallFailed(String),
}

/// One call per submitted image; the result resolves exactly once.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect_faces(&self, image: &ReceiptImage) -> Result<usize, DetectionError>;
}

/// Stand-in used when no detection engine is configured.
pub struct UnavailableDetector;

#[async_trait]
impl FaceDetector for UnavailableDetector {
    async fn detect_faces(&self, _image: &ReceiptImage) -> Result<usize, DetectionError> {
        Err(DetectionError::EngineUnavailable(
            "no face detection endpoint configured".to_string(),
        ))
    }
}
