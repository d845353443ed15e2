use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::receipt::line::DEFAULT_DISPLAY_NAME;

/// Upper bound for `PRINT_SPEED_MS`. Slower receipts are indistinguishable from a hang.
const MAX_PRINT_SPEED_MS: u64 = 60_000;

/// Application configuration loaded from environment variables.
/// Every setting has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Interval between the opening, ingredient and analysis lines.
    pub print_speed: Duration,
    pub default_display_name: String,
    /// Unset means no detection engine; every photo is rejected as unavailable.
    pub face_detection_url: Option<String>,
    pub face_detection_model: String,
    pub min_detection_confidence: f32,
    pub content_library_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let min_detection_confidence: f32 = parse_env("FACE_MIN_CONFIDENCE", 0.5)?;
        if !(0.0..=1.0).contains(&min_detection_confidence) {
            anyhow::bail!("FACE_MIN_CONFIDENCE must be between 0 and 1");
        }
        let print_speed = print_speed_from_ms(parse_env("PRINT_SPEED_MS", 800)?)?;

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            print_speed,
            default_display_name: optional_env("DEFAULT_DISPLAY_NAME")
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            face_detection_url: optional_env("FACE_DETECTION_URL"),
            face_detection_model: optional_env("FACE_DETECTION_MODEL")
                .unwrap_or_else(|| "short".to_string()),
            min_detection_confidence,
            content_library_path: optional_env("CONTENT_LIBRARY_PATH").map(PathBuf::from),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

/// Reads a variable, treating blank values as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn print_speed_from_ms(ms: u64) -> Result<Duration> {
    if !(1..=MAX_PRINT_SPEED_MS).contains(&ms) {
        anyhow::bail!("PRINT_SPEED_MS must be between 1 and {MAX_PRINT_SPEED_MS}, got {ms}");
    }
    Ok(Duration::from_millis(ms))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
