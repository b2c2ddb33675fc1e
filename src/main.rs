// Web image gallery with EXIF metadata and Google Gemini captions.

use ai_image_gallery::{
    caption::{CaptionPipeline, GeminiCaptioner},
    server::{self, AppState},
    store, Config,
};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    info!(?config, "Starting gallery");

    let store = store::from_config(&config.storage)
        .await
        .context("Failed to open object store")?;

    let captions = config.caption.as_ref().map(|caption| {
        let captioner = Arc::new(GeminiCaptioner::new(caption));
        CaptionPipeline::new(captioner, store.clone())
    });
    match &captions {
        Some(pipeline) => info!("Captioning with {}", pipeline.model_name()),
        None => info!("GEMINI_API_KEY not set, captioning disabled"),
    }

    let app = server::router(AppState::new(store, captions), config.max_upload_bytes);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Server running on http://localhost:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
