use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;

use crate::error::AdvisorError;
use crate::models::UploadedAsset;

pub mod pages;

/// Multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "image";

/// Pull the uploaded photo out of the form. `None` when no file was chosen.
pub async fn read_upload(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> Result<Option<UploadedAsset>, AdvisorError> {
    let mut asset = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, max_upload_bytes, "Invalid upload"))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error(e, max_upload_bytes, "Could not read the uploaded file"))?;

        // Browsers send an empty part when the file input was left blank
        if filename.is_empty() && bytes.is_empty() {
            continue;
        }

        log::debug!("📥 Received upload '{}' ({} bytes, {:?})", filename, bytes.len(), content_type);
        asset = Some(UploadedAsset::new(bytes.to_vec(), content_type.as_deref(), &filename));
    }

    Ok(asset)
}

fn upload_error(err: MultipartError, max_upload_bytes: usize, context: &str) -> AdvisorError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AdvisorError::TooLarge(max_upload_bytes)
    } else {
        AdvisorError::validation(format!("{}: {}", context, err.body_text()))
    }
}

/// HTTP status for an error rendered back to the browser.
pub fn status_for(error: &AdvisorError) -> StatusCode {
    match error {
        AdvisorError::Validation(_) => StatusCode::BAD_REQUEST,
        AdvisorError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        AdvisorError::Io(_) | AdvisorError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AdvisorError::UpstreamRejected(_) | AdvisorError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        AdvisorError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

pub mod server {
    use super::*;
    use axum::{
        extract::{DefaultBodyLimit, State},
        response::Html,
        routing::{get, post},
        Router,
    };
    use std::path::Path;
    use std::sync::Arc;
    use tower_http::services::ServeDir;

    use crate::handlers::{CollectingPresenter, RequestHandler};
    use crate::models::RequestState;
    use super::pages::{self, Preview};

    pub struct AppState {
        pub request_handler: Arc<RequestHandler>,
        pub max_upload_bytes: usize,
    }

    pub fn create_router(
        request_handler: Arc<RequestHandler>,
        static_dir: &Path,
        max_upload_bytes: usize,
    ) -> Router {
        let state = Arc::new(AppState {
            request_handler,
            max_upload_bytes,
        });

        Router::new()
            .route("/", get(index_handler))
            .route("/analyze", post(analyze_handler))
            .route("/health", get(health_check))
            .nest_service("/static", ServeDir::new(static_dir))
            .layer(DefaultBodyLimit::max(max_upload_bytes))
            .with_state(state)
    }

    async fn index_handler() -> Html<String> {
        Html(pages::index_page())
    }

    async fn analyze_handler(
        State(state): State<Arc<AppState>>,
        multipart: Multipart,
    ) -> (StatusCode, Html<String>) {
        let asset = match read_upload(multipart, state.max_upload_bytes).await {
            Ok(asset) => asset,
            Err(e) => {
                log::warn!("⚠️ Unreadable upload: {}", e);
                return (status_for(&e), Html(pages::error_page(None, &e)));
            }
        };

        let preview = asset
            .as_ref()
            .filter(|a| a.is_supported() && !a.bytes.is_empty())
            .map(|a| Preview::new(&a.mime_type, &a.bytes));

        // Run detached so a client disconnect cannot skip the staging cleanup
        let handler = state.request_handler.clone();
        let task = tokio::spawn(async move {
            let mut presenter = CollectingPresenter::default();
            let outcome = handler.submit(asset, &mut presenter).await;
            (outcome, presenter)
        });

        let (outcome, presenter) = match task.await {
            Ok(done) => done,
            Err(e) => {
                log::error!("❌ Submission task failed: {}", e);
                let err = AdvisorError::UpstreamUnavailable("the request could not be completed".to_string());
                return (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::error_page(preview.as_ref(), &err)));
            }
        };

        match (outcome, presenter.result, presenter.error) {
            (RequestState::Done, Some(result), _) => {
                (StatusCode::OK, Html(pages::result_page(preview.as_ref(), &result)))
            }
            (_, _, Some(e)) => (status_for(&e), Html(pages::error_page(preview.as_ref(), &e))),
            (other, _, _) => {
                log::error!("❌ Submission ended in state {} without an outcome", other);
                let err = AdvisorError::UpstreamUnavailable("no answer was produced".to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::error_page(preview.as_ref(), &err)))
            }
        }
    }

    async fn health_check() -> &'static str {
        "OK"
    }
}

#[cfg(test)]
mod tests {
    use super::server::create_router;
    use super::*;
    use crate::error::AdvisorResult;
    use crate::handlers::RequestHandler;
    use crate::models::{InferenceRequest, RemoteFileHandle, StagedFile};
    use crate::services::{InferenceClient, StagingStore};
    use axum::body::Body;
    use axum::http::Request;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "----calorieadvisorboundary";

    struct FixedReply(Result<&'static str, &'static str>);

    #[async_trait::async_trait]
    impl InferenceClient for FixedReply {
        async fn ingest(&self, staged: &StagedFile) -> AdvisorResult<RemoteFileHandle> {
            Ok(RemoteFileHandle {
                name: "files/stub".to_string(),
                uri: "https://stub.invalid/files/stub".to_string(),
                mime_type: staged.mime_type.clone(),
                display_name: staged.display_name.clone(),
                expires_at: None,
            })
        }

        async fn generate(&self, _request: &InferenceRequest) -> AdvisorResult<String> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(msg) => Err(AdvisorError::UpstreamRejected(msg.to_string())),
            }
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("web-test-{}", uuid::Uuid::new_v4().simple()))
    }

    fn app(dir: &std::path::Path, reply: Result<&'static str, &'static str>) -> axum::Router {
        app_with_limit(dir, reply, 1024 * 1024)
    }

    fn app_with_limit(
        dir: &std::path::Path,
        reply: Result<&'static str, &'static str>,
        max_upload_bytes: usize,
    ) -> axum::Router {
        let handler = RequestHandler::new(
            StagingStore::new(dir),
            Arc::new(FixedReply(reply)),
            "Count the calories.".to_string(),
        );
        create_router(Arc::new(handler), &PathBuf::from("static"), max_upload_bytes)
    }

    fn multipart_request(filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_and_health() {
        let dir = scratch_dir();

        let response = app(&dir, Ok("unused"))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Tell me the total calories"));

        let response = app(&dir, Ok("unused"))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_analyze_renders_model_text() {
        let dir = scratch_dir();

        let response = app(&dir, Ok("3 items, 450 calories total"))
            .oneshot(multipart_request("meal.png", "image/png", &[0x89, 0x50, 0x4E, 0x47]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<pre class=\"response\">3 items, 450 calories total</pre>"));
        assert!(html.contains("Uploaded file 'meal.png' as: https://stub.invalid/files/stub"));
        assert!(html.contains("data:image/png;base64,iVBORw=="));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_analyze_without_file_is_bad_request() {
        let dir = scratch_dir();

        let response = app(&dir, Ok("unused"))
            .oneshot(multipart_request("", "application/octet-stream", b""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Please upload an image first."));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_analyze_upstream_rejection_is_bad_gateway() {
        let dir = scratch_dir();

        let response = app(&dir, Err("Unsupported MIME type"))
            .oneshot(multipart_request("meal.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let html = body_text(response).await;
        assert!(html.contains("Gemini rejected the request: Unsupported MIME type"));
        assert!(!html.contains("The Response is"));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_payload_too_large() {
        let dir = scratch_dir();

        let response = app_with_limit(&dir, Ok("unused"), 1024)
            .oneshot(multipart_request("big.png", "image/png", &[0x42; 4096]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let html = body_text(response).await;
        assert!(html.contains("The image is larger than 1024 bytes"));
        assert!(!dir.exists());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&AdvisorError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&AdvisorError::TooLarge(10)), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(status_for(&AdvisorError::UpstreamTimeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_for(&AdvisorError::UpstreamUnavailable("down".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&AdvisorError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
