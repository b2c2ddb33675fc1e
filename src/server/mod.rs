//! HTTP surface of the gallery.

mod handlers;
pub mod pages;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::caption::CaptionPipeline;
use crate::store::ObjectStore;

/// Services shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    /// Present when captioning is configured.
    pub captions: Option<CaptionPipeline>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, captions: Option<CaptionPipeline>) -> Self {
        Self { store, captions }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload))
        .route("/files", get(handlers::list_files))
        .route("/files/:name", get(handlers::file_detail))
        .route("/image/:name", get(handlers::image))
        .route("/delete/:name", post(handlers::delete))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}
