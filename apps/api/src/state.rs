use std::sync::Arc;

use crate::config::Config;
use crate::gating::FaceDetector;
use crate::playback::Session;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// The one playback session this service hosts.
    pub session: Session,
    /// Pluggable face detector. Remote when FACE_DETECTION_URL is set.
    pub detector: Arc<dyn FaceDetector>,
}
