//! Face-count gate: exactly two faces unlock playback.
//!
//! Every other outcome becomes an error status message for the client; none of
//! them is an HTTP failure.

use serde::{Serialize, Serializer};

use crate::gating::detector::DetectionError;
use crate::playback::controller::StatusMessage;

pub const REQUIRED_FACES: usize = 2;

const ANALYZING_TEXT: &str = "AI 正在深度扫描画面的心动信号...";
const MATCHED_TEXT: &str = "回忆匹配成功！正在同步你们的心跳...";

/// Why a photo did not pass. Serializes as its bare code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    NoFacesDetected,
    SingleFaceDetected,
    TooManyFaces { count: usize },
    DetectionEngineUnavailable,
    DetectionCallFailed,
}

impl GateRejection {
    pub fn code(&self) -> &'static str {
        match self {
            GateRejection::NoFacesDetected => "NO_FACES_DETECTED",
            GateRejection::SingleFaceDetected => "SINGLE_FACE_DETECTED",
            GateRejection::TooManyFaces { .. } => "TOO_MANY_FACES",
            GateRejection::DetectionEngineUnavailable => "DETECTION_ENGINE_UNAVAILABLE",
            GateRejection::DetectionCallFailed => "DETECTION_CALL_FAILED",
        }
    }

    pub fn status_message(&self) -> StatusMessage {
        let text = match self {
            GateRejection::NoFacesDetected => {
                "这里似乎还未留下你们的足迹。快上传一张合影，开启这段专属浪漫吧 🍃"
            }
            GateRejection::SingleFaceDetected => {
                "怎么只有一个人呢？这张回执正在等待另一个灵魂的出现 ✨"
            }
            GateRejection::TooManyFaces { .. } => {
                "这份契约太拥挤啦，快换一张只有你们两人的纯净合影吧 🕊️"
            }
            GateRejection::DetectionEngineUnavailable => "浪漫引擎启动失败，请刷新重试。",
            GateRejection::DetectionCallFailed => {
                "画面太糊啦，AI 感应不到你们的甜蜜，换一张试试？"
            }
        };
        StatusMessage::error(text)
    }
}

impl Serialize for GateRejection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Classifies a detection result.
pub fn evaluate(result: &Result<usize, DetectionError>) -> Result<(), GateRejection> {
    match result {
        Ok(REQUIRED_FACES) => Ok(()),
        Ok(0) => Err(GateRejection::NoFacesDetected),
        Ok(1) => Err(GateRejection::SingleFaceDetected),
        Ok(count) => Err(GateRejection::TooManyFaces { count: *count }),
        Err(DetectionError::EngineUnavailable(_)) => Err(GateRejection::DetectionEngineUnavailable),
        Err(DetectionError::CallFailed(_)) => Err(GateRejection::DetectionCallFailed),
    }
}

pub fn analyzing_message() -> StatusMessage {
    StatusMessage::info(ANALYZING_TEXT)
}

pub fn matched_message() -> StatusMessage {
    StatusMessage::success(MATCHED_TEXT)
}
