//! Axum route handlers for the session and receipt API.

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::errors::AppError;
use crate::playback::controller::SessionSnapshot;
use crate::playback::session::PhotoOutcome;
use crate::receipt::{ReceiptExport, ReceiptImage};
use crate::state::AppState;

/// GET /api/v1/session
///
/// Current playback state, revealed lines and status message. Clients poll this
/// to animate the receipt.
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}

/// POST /api/v1/session/photo
///
/// Multipart form: `image` (required, `image/*`) and `name` (optional).
/// Runs the two-face gate once. Gate rejections return 200 with `accepted: false`.
pub async fn handle_submit_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PhotoOutcome>, AppError> {
    let mut name: Option<String> = None;
    let mut image: Option<ReceiptImage> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = Some(field.text().await?),
            "image" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                if !content_type.starts_with("image/") {
                    return Err(AppError::Validation(format!(
                        "image must have an image/* content type, got '{content_type}'"
                    )));
                }
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    return Err(AppError::Validation("image cannot be empty".to_string()));
                }
                image = Some(ReceiptImage {
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let image =
        image.ok_or_else(|| AppError::Validation("image field is required".to_string()))?;

    let outcome = state
        .session
        .submit_photo(state.detector.as_ref(), name.as_deref(), image)
        .await?;

    Ok(Json(outcome))
}

/// POST /api/v1/session/reset
pub async fn handle_reset(State(state): State<AppState>) -> StatusCode {
    state.session.reset().await;
    StatusCode::NO_CONTENT
}

/// GET /api/v1/receipt
///
/// The finished receipt for the client-side exporter. 409 until playback finishes.
pub async fn handle_get_receipt(
    State(state): State<AppState>,
) -> Result<Json<ReceiptExport>, AppError> {
    let export = state.session.export().await?;
    info!("Receipt {} exported as {}", export.voucher_no, export.file_name);
    Ok(Json(export))
}

/// GET /api/v1/receipt/image
pub async fn handle_get_receipt_image(State(state): State<AppState>) -> Result<Response, AppError> {
    let image = state
        .session
        .export_image()
        .await?
        .ok_or_else(|| AppError::NotFound("No photo attached to this receipt".to_string()))?;

    Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes).into_response())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
