//! HTTP face detection client.
//!
//! Sends the raw image to an external detection service and counts the
//! returned detections. A single attempt per image; failures are reported, not retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::gating::detector::{DetectionError, FaceDetector};
use crate::receipt::ReceiptImage;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

#[derive(Debug, Deserialize)]
pub struct Detection {
    /// Engines that pre-filter by confidence may omit the score.
    pub score: Option<f32>,
}

#[derive(Clone)]
pub struct RemoteFaceDetector {
    client: Client,
    endpoint: String,
    model: String,
    min_confidence: f32,
}

impl RemoteFaceDetector {
    pub fn new(endpoint: String, model: String, min_confidence: f32) -> Result<Self, DetectionError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DetectionError::EngineUnavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model,
            min_confidence,
        })
    }
}

#[async_trait]
impl FaceDetector for RemoteFaceDetector {
    async fn detect_faces(&self, image: &ReceiptImage) -> Result<usize, DetectionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("model", self.model.clone()),
                ("min_confidence", self.min_confidence.to_string()),
            ])
            .header("content-type", &image.content_type)
            .body(image.bytes.clone())
            .send()
            .await
            .map_err(|e| {
                warn!("Face detection request failed: {e}");
                if e.is_connect() || e.is_timeout() {
                    DetectionError::EngineUnavailable(e.to_string())
                } else {
                    DetectionError::CallFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("Face detection service returned {status}: {body}");
            return Err(DetectionError::EngineUnavailable(format!(
                "detection service returned {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::CallFailed(format!(
                "detection service returned {status}: {body}"
            )));
        }

        let parsed: DetectionResponse = response
            .json()
            .await
            .map_err(|e| DetectionError::CallFailed(format!("unreadable detection response: {e}")))?;

        let count = count_faces(&parsed, self.min_confidence);
        debug!(
            "Face detection returned {} raw detections, {} above {}",
            parsed.detections.len(),
            count,
            self.min_confidence
        );
        Ok(count)
    }
}

/// Counts detections at or above `min_confidence`; unscored detections count.
pub fn count_faces(response: &DetectionResponse, min_confidence: f32) -> usize {
    response
        .detections
        .iter()
        .filter(|d| d.score.map_or(true, |s| s >= min_confidence))
        .count()
}
