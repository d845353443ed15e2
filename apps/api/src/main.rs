mod config;
mod errors;
mod gating;
mod playback;
mod receipt;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::gating::{FaceDetector, RemoteFaceDetector, UnavailableDetector};
use crate::playback::Session;
use crate::receipt::ContentLibrary;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Receipt API v{}", env!("CARGO_PKG_VERSION"));

    // Content library: an invalid replacement file is a configuration error
    let library = match &config.content_library_path {
        Some(path) => {
            let library = ContentLibrary::load(path)?;
            info!("Content library loaded from {}", path.display());
            library
        }
        None => ContentLibrary::builtin(),
    };

    let detector = build_detector(&config);

    let session = Session::new(
        Arc::new(library),
        config.print_speed,
        &config.default_display_name,
    );
    info!(
        "Playback configured: print speed {:?}, default name '{}'",
        config.print_speed, config.default_display_name
    );

    let state = AppState {
        config: config.clone(),
        session,
        detector,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Remote detector when configured; otherwise every photo is reported as
/// "engine unavailable" so the client can tell the user to retry later.
fn build_detector(config: &Config) -> Arc<dyn FaceDetector> {
    let Some(url) = &config.face_detection_url else {
        warn!("FACE_DETECTION_URL not set; face detection is unavailable");
        return Arc::new(UnavailableDetector);
    };

    match RemoteFaceDetector::new(
        url.clone(),
        config.face_detection_model.clone(),
        config.min_detection_confidence,
    ) {
        Ok(detector) => {
            info!(
                "Face detector initialized ({url}, model {}, min confidence {})",
                config.face_detection_model, config.min_detection_confidence
            );
            Arc::new(detector)
        }
        Err(e) => {
            warn!("Face detector failed to initialize: {e}");
            Arc::new(UnavailableDetector)
        }
    }
}
