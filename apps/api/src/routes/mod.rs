pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::playback::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Session API
        .route("/api/v1/session", get(handlers::handle_get_session))
        .route("/api/v1/session/photo", post(handlers::handle_submit_photo))
        .route("/api/v1/session/reset", post(handlers::handle_reset))
        // Export API
        .route("/api/v1/receipt", get(handlers::handle_get_receipt))
        .route(
            "/api/v1/receipt/image",
            get(handlers::handle_get_receipt_image),
        )
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
