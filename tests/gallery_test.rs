//! End-to-end tests of the gallery router over an in-memory store.
//!
//! Covers upload → list → detail → image → delete, captioning outcomes and
//! same-name upload races.

use ai_image_gallery::caption::{CaptionError, CaptionPipeline, Captioner};
use ai_image_gallery::server::{router, AppState};
use ai_image_gallery::store::{MemoryStore, ObjectStore};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::{DynamicImage, ImageBuffer, Rgb};
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "gallery-test-boundary";
const LIMIT: usize = 10 * 1024 * 1024;

/// Captioner that always answers with the same text (or fails).
struct FixedCaptioner {
    reply: Option<&'static str>,
    fail: bool,
}

#[async_trait]
impl Captioner for FixedCaptioner {
    async fn caption(&self, _image: &[u8], _mime_type: &str) -> Result<Option<String>, CaptionError> {
        if self.fail {
            return Err(CaptionError::InvalidResponse("boom".to_string()));
        }
        Ok(self.reply.map(str::to_string))
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

fn jpeg(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb([shade, 40, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Jpeg(90))
        .unwrap();
    bytes
}

fn app(store: Arc<MemoryStore>, captioner: Option<FixedCaptioner>) -> Router {
    let store: Arc<dyn ObjectStore> = store;
    let captions = captioner.map(|c| CaptionPipeline::new(Arc::new(c), store.clone()));
    router(AppState::new(store, captions), LIMIT)
}

fn upload_request(filename: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"form_file\"; filename=\"{filename}\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn text(app: &Router, uri: &str) -> (StatusCode, String) {
    let (status, body) = send(app, get(uri)).await;
    (status, String::from_utf8(body).unwrap())
}

async fn listed(app: &Router) -> Vec<String> {
    let (status, body) = send(app, get("/files")).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn upload_caption_view_and_delete() {
    let store = Arc::new(MemoryStore::new());
    let app = app(
        store.clone(),
        Some(FixedCaptioner {
            reply: Some("**Title:** Sunset\n**Description:** A red sky"),
            fail: false,
        }),
    );
    let image = jpeg(64, 48, 200);

    let response = app
        .clone()
        .oneshot(upload_request("sunset.jpg", &image))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    assert_eq!(listed(&app).await, vec!["sunset.jpg"]);
    assert_eq!(
        store.get("sunset.txt").await.unwrap(),
        b"Title: Sunset\nDescription: A red sky"
    );

    let (status, index) = text(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(index.contains("sunset.jpg"));
    assert!(index.contains("Sunset"));
    assert!(index.contains("A red sky"));
    assert!(index.contains(r#"action="/delete/sunset.jpg""#));

    let (status, detail) = text(&app, "/files/sunset.jpg").await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail.contains("<tr><td>Image Size</td><td>(64, 48)</td></tr>"));
    assert!(detail.contains("<tr><td>Image Format</td><td>JPEG</td></tr>"));
    assert!(detail.contains("<tr><td>EXIF data not available</td><td></td></tr>"));
    assert!(detail.contains("A red sky"));

    let response = app.clone().oneshot(get("/image/sunset.jpg")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let served = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(served.as_ref(), image.as_slice());

    let (status, _) = send(&app, post("/delete/sunset.jpg")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert!(listed(&app).await.is_empty());
    assert!(store.list().await.unwrap().is_empty());

    let (status, _) = text(&app, "/files/sunset.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get("/image/sunset.jpg")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn caption_failure_keeps_the_image() {
    let store = Arc::new(MemoryStore::new());
    let app = app(
        store.clone(),
        Some(FixedCaptioner {
            reply: None,
            fail: true,
        }),
    );

    let (status, _) = send(&app, upload_request("a.jpg", &jpeg(8, 8, 1))).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(store.list().await.unwrap(), vec!["a.jpg"]);

    let (status, index) = text(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(index.contains("a.jpg"));
    assert!(!index.contains(r#"class="title""#));
}

#[tokio::test]
async fn empty_caption_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let app = app(
        store.clone(),
        Some(FixedCaptioner {
            reply: None,
            fail: false,
        }),
    );
    send(&app, upload_request("a.jpg", &jpeg(8, 8, 1))).await;
    assert_eq!(store.list().await.unwrap(), vec!["a.jpg"]);
}

#[tokio::test]
async fn uploads_without_captioner() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), None);
    send(&app, upload_request("photos/2024/holiday.JPEG", &jpeg(8, 8, 1))).await;
    assert_eq!(store.list().await.unwrap(), vec!["holiday.JPEG"]);
    assert_eq!(
        store.content_type("holiday.JPEG").await.as_deref(),
        Some("image/jpeg")
    );
}

#[tokio::test]
async fn rejects_non_jpeg_and_empty_uploads() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), None);

    let (status, _) = send(&app, upload_request("notes.txt", b"hello")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let (status, _) = send(&app, upload_request("", b"")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_hides_sidecars_and_other_objects() {
    let store = Arc::new(MemoryStore::new());
    store.put("b.jpg", jpeg(4, 4, 9), "image/jpeg").await.unwrap();
    store.put("b.txt", b"Title: B\nDescription: Bee".to_vec(), "text/plain").await.unwrap();
    store.put("a.jpeg", jpeg(4, 4, 9), "image/jpeg").await.unwrap();
    store.put("readme.md", b"#".to_vec(), "text/markdown").await.unwrap();
    let app = app(store, None);

    assert_eq!(listed(&app).await, vec!["a.jpeg", "b.jpg"]);
    let (_, index) = text(&app, "/").await;
    assert!(index.contains("Bee"));
    assert!(!index.contains("readme.md"));
}

#[tokio::test]
async fn undecodable_image_renders_error_page() {
    let store = Arc::new(MemoryStore::new());
    store.put("broken.jpg", b"not a jpeg".to_vec(), "image/jpeg").await.unwrap();
    let app = app(store, None);

    let (status, body) = text(&app, "/files/broken.jpg").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("unsupported image format"));
}

#[tokio::test]
async fn delete_without_sidecar_and_of_missing_files() {
    let store = Arc::new(MemoryStore::new());
    store.put("lone.jpg", jpeg(4, 4, 9), "image/jpeg").await.unwrap();
    let app = app(store.clone(), None);

    let (status, _) = send(&app, post("/delete/lone.jpg")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let (status, _) = send(&app, post("/delete/lone.jpg")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_same_name_uploads_keep_one_version() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), None);
    let first = jpeg(16, 16, 10);
    let second = jpeg(32, 32, 250);

    let (a, b) = tokio::join!(
        send(&app, upload_request("race.jpg", &first)),
        send(&app, upload_request("race.jpg", &second)),
    );
    assert_eq!(a.0, StatusCode::SEE_OTHER);
    assert_eq!(b.0, StatusCode::SEE_OTHER);

    let stored = store.get("race.jpg").await.unwrap();
    assert!(stored == first || stored == second);
    assert_eq!(listed(&app).await, vec!["race.jpg"]);
}

#[tokio::test]
async fn images_sharing_a_stem_cannot_share_a_caption() {
    let store = Arc::new(MemoryStore::new());
    let app = app(
        store.clone(),
        Some(FixedCaptioner {
            reply: Some("**Title:** Cat\n**Description:** A cat"),
            fail: false,
        }),
    );

    send(&app, upload_request("pet.jpg", &jpeg(8, 8, 1))).await;
    let (status, _) = send(&app, upload_request("pet.jpeg", &jpeg(8, 8, 2))).await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    assert_eq!(listed(&app).await, vec!["pet.jpg"]);
    assert_eq!(
        store.get("pet.txt").await.unwrap(),
        b"Title: Cat\nDescription: A cat"
    );

    // Re-uploading under the same key still replaces its own record.
    send(&app, upload_request("pet.jpg", &jpeg(8, 8, 3))).await;
    assert_eq!(listed(&app).await, vec!["pet.jpg"]);
}

#[tokio::test]
async fn delete_keeps_a_record_another_image_still_uses() {
    let store = Arc::new(MemoryStore::new());
    store.put("pet.jpg", jpeg(4, 4, 9), "image/jpeg").await.unwrap();
    store.put("pet.jpeg", jpeg(4, 4, 9), "image/jpeg").await.unwrap();
    store.put("pet.txt", b"Title: Cat\nDescription: A cat".to_vec(), "text/plain").await.unwrap();
    let app = app(store.clone(), None);

    send(&app, post("/delete/pet.jpeg")).await;
    assert_eq!(store.list().await.unwrap(), vec!["pet.jpg", "pet.txt"]);

    send(&app, post("/delete/pet.jpg")).await;
    assert!(store.list().await.unwrap().is_empty());
}
