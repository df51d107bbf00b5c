//! HTTP boundary: upload, stream, status, cleanup.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `GET` | `/` | health |
//! | `POST` | `/upload` | multipart field `file` → `{job_id, filename, message}` |
//! | `GET` | `/stream-summary/{job_id}` | server-sent events `summary` / `error` |
//! | `GET` | `/status/{job_id}` | `{job_id, status, filename}` |
//! | `DELETE` | `/cleanup/{job_id}` | `{job_id, message}` |
//!
//! Boundary errors (unknown job, bad upload) are plain HTTP errors with a
//! `{"detail": ...}` body. Pipeline errors arrive as the stream's `error`
//! event.

use crate::config::SummaryConfig;
use crate::error::DocveilError;
use crate::jobs::{CleanupResponse, JobRegistry, StatusResponse, UploadResponse};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{delete, get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Default cap on a request body, and so on one upload.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 100;

/// Server state shared across handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<JobRegistry>,
    /// Template for every run; the job supplies the document.
    pub config: Arc<SummaryConfig>,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
}

impl ApiState {
    pub fn new(registry: JobRegistry, config: SummaryConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }

    /// Raise or lower the upload cap (in MiB, at least 1).
    pub fn with_max_upload_mb(mut self, mb: usize) -> Self {
        self.max_upload_bytes = mb.max(1).saturating_mul(1024 * 1024);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(err: DocveilError) -> ApiError {
    let status = match err.kind() {
        "not_found" => StatusCode::NOT_FOUND,
        "invalid" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("{}", err);
    } else {
        warn!("{}", err);
    }
    (
        status,
        Json(ErrorBody {
            detail: err.to_string(),
        }),
    )
}

fn bad_request(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

/// Build the router with all endpoints.
///
/// axum caps bodies at 2 MB unless told otherwise; the cap here comes from
/// [`ApiState::max_upload_bytes`].
pub fn build_router(state: ApiState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(health_check))
        .route("/upload", post(upload))
        .route("/stream-summary/{job_id}", get(stream_summary))
        .route("/status/{job_id}", get(job_status))
        .route("/cleanup/{job_id}", delete(cleanup))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: ApiState) -> Result<(), std::io::Error> {
    info!(
        "Starting docveil server on {} (uploads up to {} bytes)",
        listener.local_addr()?,
        state.max_upload_bytes
    );
    axum::serve(listener, build_router(state)).await
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "docveil".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Accept a PDF upload, encrypt it and register a job.
pub async fn upload(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            warn!("Could not read upload {}: {}", filename, e);
            (
                e.status(),
                Json(ErrorBody {
                    detail: format!("Could not read upload: {}", e.body_text()),
                }),
            )
        })?;
        info!("Upload received: {} ({} bytes)", filename, bytes.len());
        return state
            .registry
            .upload(&filename, bytes.to_vec())
            .await
            .map(Json)
            .map_err(api_error);
    }
    Err(bad_request("Missing multipart field 'file'"))
}

/// Summarize an uploaded job, streaming progress as server-sent events.
pub async fn stream_summary(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let events = state
        .registry
        .stream(&job_id, &state.config)
        .await
        .map_err(api_error)?;

    let sse = events.map(|event| {
        Ok(Event::default()
            .event(event.event_name())
            .data(event.to_json()))
    });
    Ok(Sse::new(sse).keep_alive(KeepAlive::default()))
}

pub async fn job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.registry.status(&job_id).await.map(Json).map_err(api_error)
}

pub async fn cleanup(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<CleanupResponse>, ApiError> {
    state.registry.cleanup(&job_id).await.map(Json).map_err(api_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Passphrase;
    use crate::error::ServiceError;
    use crate::jobs::JobStatus;
    use crate::pipeline::extract::PageExtractor;
    use crate::service::SummaryService;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl SummaryService for Echo {
        async fn summarize(&self, text: &str) -> Result<String, ServiceError> {
            Ok(text.to_string())
        }

        async fn refine(&self, _previous: &str, current: &str) -> Result<String, ServiceError> {
            Ok(format!("{current}+"))
        }
    }

    struct Pages;

    impl PageExtractor for Pages {
        fn extract(&self, _bytes: &[u8]) -> Result<Vec<String>, String> {
            Ok(vec!["A".into(), "B".into()])
        }
    }

    fn state(dir: &std::path::Path) -> ApiState {
        let config = SummaryConfig::builder()
            .service(Arc::new(Echo))
            .extractor(Arc::new(Pages))
            .build()
            .unwrap();
        ApiState::new(JobRegistry::new(dir, Passphrase::new("srv")), config)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let resp = health_check().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "docveil");
    }

    #[tokio::test]
    async fn unknown_job_is_404_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());

        let (code, _) = job_status(State(st.clone()), Path("missing".into()))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);

        let (code, _) = cleanup(State(st.clone()), Path("missing".into()))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);

        let (code, body) = stream_summary(State(st), Path("missing".into()))
            .await
            .err()
            .unwrap();
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert!(body.detail.contains("missing"));
    }

    #[tokio::test]
    async fn stream_emits_sse_events_and_completes_job() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        let uploaded = st
            .registry
            .upload("paper.pdf", b"%PDF-1.7 body".to_vec())
            .await
            .unwrap();

        let resp = stream_summary(State(st.clone()), Path(uploaded.job_id.clone()))
            .await
            .unwrap()
            .into_response();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert_eq!(text.matches("event: summary").count(), 3, "{text}");
        assert!(!text.contains("event: error"));
        assert!(text.contains(r#""summary":"B+""#));
        assert!(text.contains(r#""status":"complete""#));

        let Json(status) = job_status(State(st), Path(uploaded.job_id))
            .await
            .unwrap();
        assert_eq!(status.status, JobStatus::Complete);
    }

    #[tokio::test]
    async fn cleanup_then_status_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        let uploaded = st
            .registry
            .upload("paper.pdf", b"%PDF-1.7 body".to_vec())
            .await
            .unwrap();

        let Json(resp) = cleanup(State(st.clone()), Path(uploaded.job_id.clone()))
            .await
            .unwrap();
        assert_eq!(resp.job_id, uploaded.job_id);

        let (code, _) = job_status(State(st), Path(uploaded.job_id))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);
    }

    async fn spawn_server(st: ApiState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, st));
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn upload_larger_than_two_megabytes_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        let registry = Arc::clone(&st.registry);
        let base = spawn_server(st).await;

        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.resize(3 * 1024 * 1024, b'0');
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(pdf).file_name("scan.pdf"),
        );
        let resp = reqwest::Client::new()
            .post(format!("{base}/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let body = resp.bytes().await.unwrap();
        let uploaded: UploadResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(uploaded.filename, "scan.pdf");
        let status = registry.status(&uploaded.job_id).await.unwrap();
        assert_eq!(status.status, JobStatus::Uploaded);
    }

    #[test]
    fn upload_cap_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path());
        assert_eq!(st.max_upload_bytes, DEFAULT_MAX_UPLOAD_MB * 1024 * 1024);
        assert_eq!(st.clone().with_max_upload_mb(8).max_upload_bytes, 8 * 1024 * 1024);
        assert_eq!(st.with_max_upload_mb(0).max_upload_bytes, 1024 * 1024);
    }

    #[test]
    fn router_builds() {
        let dir = tempfile::tempdir().unwrap();
        let _router = build_router(state(dir.path()));
    }
}
