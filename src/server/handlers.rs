use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::pages::{self, GalleryItem};
use super::AppState;
use crate::caption::{load_caption, CaptionOutcome};
use crate::error::{AppError, StoreError};
use crate::metadata;
use crate::store::{content_type_for, is_image_key, sidecar_key};

const UPLOAD_FIELD: &str = "form_file";

pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    info!("GET /");
    let names = image_names(&state).await?;

    let mut items = Vec::with_capacity(names.len());
    for name in names {
        let caption = match load_caption(state.store.as_ref(), &name).await {
            Ok(caption) => caption,
            Err(e) => {
                warn!(key = %name, error = %e, "Could not read caption record");
                None
            }
        };
        items.push(GalleryItem { name, caption });
    }

    Ok(Html(pages::index(&items)))
}

pub async fn upload(State(state): State<Arc<AppState>>, multipart: Multipart) -> Redirect {
    info!("POST /upload");
    match receive_upload(&state, multipart).await {
        Ok(Some(key)) => info!(key = %key, "Upload complete"),
        Ok(None) => warn!("No file uploaded"),
        Err(e) => error!(error = %e, "Upload failed"),
    }
    Redirect::to("/")
}

#[derive(Debug, thiserror::Error)]
enum UploadError {
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("rejected file name {0:?}: only .jpg and .jpeg images are accepted")]
    NotAnImage(String),

    #[error("{key:?} would share the caption record of {existing:?}")]
    RecordTaken { key: String, existing: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Store the `form_file` part and caption it. Returns the stored key.
async fn receive_upload(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<Option<String>, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let key = field.file_name().map(basename).unwrap_or_default();
        let content_type = field
            .content_type()
            .map_or_else(|| content_type_for(&key).to_string(), str::to_string);
        let data = field.bytes().await?;

        if key.is_empty() || data.is_empty() {
            return Ok(None);
        }
        if !is_image_key(&key) {
            return Err(UploadError::NotAnImage(key));
        }
        if let Some(existing) = record_sibling(state, &key).await? {
            return Err(UploadError::RecordTaken { key, existing });
        }

        state.store.put(&key, data.to_vec(), &content_type).await?;
        info!(key = %key, bytes = data.len(), store = state.store.name(), "Stored image");

        if let Some(pipeline) = &state.captions {
            match pipeline.run(&key, &data, &content_type).await {
                CaptionOutcome::Captioned(_) => {}
                CaptionOutcome::Skipped => info!(key = %key, "Caption skipped"),
                CaptionOutcome::Failed(reason) => {
                    warn!(key = %key, %reason, "Caption failed, image kept");
                }
            }
        }
        return Ok(Some(key));
    }
    Ok(None)
}

/// Last path component of a client-supplied file name.
fn basename(name: &str) -> String {
    name.rsplit(&['/', '\\'][..]).next().unwrap_or_default().trim().to_string()
}

pub async fn list_files(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, AppError> {
    info!("GET /files");
    Ok(Json(image_names(&state).await?))
}

pub async fn file_detail(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Html<String>, AppError> {
    info!("GET /files/{name}");
    let bytes = state.store.get(&name).await?;
    let meta = metadata::extract_blocking(name.clone(), bytes).await?;

    let caption = match load_caption(state.store.as_ref(), &name).await {
        Ok(caption) => caption,
        Err(e) => {
            warn!(key = %name, error = %e, "Could not read caption record");
            None
        }
    };

    Ok(Html(pages::detail(&name, caption.as_ref(), &meta.entries())))
}

pub async fn image(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    info!("GET /image/{name}");
    let bytes = state.store.get(&name).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&name))], bytes).into_response())
}

pub async fn delete(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Redirect {
    info!("POST /delete/{name}");
    if !is_image_key(&name) {
        warn!(key = %name, "Refusing to delete a non-image key");
        return Redirect::to("/");
    }

    // Image first; a failed sidecar delete leaves an orphaned record.
    if let Err(e) = state.store.delete(&name).await {
        error!(key = %name, error = %e, "Failed to delete image");
        return Redirect::to("/");
    }
    let record = sidecar_key(&name);
    match record_sibling(&state, &name).await {
        Ok(None) => {}
        Ok(Some(owner)) => {
            info!(key = %record, owner = %owner, "Caption record still in use, kept");
            return Redirect::to("/");
        }
        Err(e) => {
            error!(key = %record, error = %e, "Could not check caption record owners");
            return Redirect::to("/");
        }
    }
    if let Err(e) = state.store.delete(&record).await {
        error!(key = %record, error = %e, "Failed to delete caption record");
    }
    Redirect::to("/")
}

async fn image_names(state: &AppState) -> Result<Vec<String>, StoreError> {
    let mut names = state.store.list().await?;
    names.retain(|name| is_image_key(name));
    Ok(names)
}

/// Another stored image whose caption record key is the same as `key`'s.
async fn record_sibling(state: &AppState, key: &str) -> Result<Option<String>, StoreError> {
    let record = sidecar_key(key);
    let names = image_names(state).await?;
    Ok(names
        .into_iter()
        .find(|name| name != key && sidecar_key(name) == record))
}
