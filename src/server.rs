//! JSON HTTP API over the sync and query engines.
//!
//! # Endpoints
//!
//! | Method | Path             | Description |
//! |--------|------------------|-------------|
//! | `GET`  | `/`              | Liveness message |
//! | `POST` | `/upload`        | Multipart file upload; schedules a sync |
//! | `POST` | `/ingest`        | Schedule a sync in the background |
//! | `GET`  | `/ingest/status` | State of the background sync job |
//! | `POST` | `/search`        | Similarity search |
//! | `POST` | `/qa`            | Grounded answer generation |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `conflict` (409), `internal` (500).
//! Validation failures are recognized by message ("must not be empty") and
//! mapped to 400; everything else from the engines surfaces as 500 with the
//! underlying message attached.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::{Embedder, EmbeddingClient};
use crate::jobs::{IngestJob, IngestTracker};
use crate::llm::ChatClient;
use crate::query;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    embedder: Arc<EmbeddingClient>,
    llm: Arc<ChatClient>,
    ingest: IngestTracker,
}

/// Start the HTTP server on the configured bind address.
///
/// Both provider clients are constructed up front; a missing
/// `OPENAI_API_KEY` is a startup error.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);
    let llm = Arc::new(ChatClient::new(&config.llm)?);
    println!(
        "providers: embeddings={} ({} dims), llm={}",
        embedder.model_name(),
        embedder.dims(),
        llm.model_name()
    );

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        embedder,
        llm,
        ingest: IngestTracker::new(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_root))
        .route("/upload", post(handle_upload))
        .route("/ingest", post(handle_ingest))
        .route("/ingest/status", get(handle_ingest_status))
        .route("/search", post(handle_search))
        .route("/qa", post(handle_qa))
        .layer(cors)
        // 50 MiB cap for document uploads.
        .layer(axum::extract::DefaultBodyLimit::max(50 * 1024 * 1024))
        .with_state(state);

    println!("docqa API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "conflict".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map engine errors to HTTP statuses: input-validation failures become 400,
/// everything else 500 with the underlying message attached.
fn classify_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();
    if msg.contains("must not be empty") {
        bad_request(msg)
    } else {
        internal(msg)
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    message: String,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("docqa {} is running.", env!("CARGO_PKG_VERSION")),
    })
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    filename: String,
    message: String,
}

/// Accept a multipart file, persist it under the upload directory, and
/// schedule a sync. The upload succeeds even when a sync is already in
/// flight; the message says whether ingestion was started.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };

        // Strip any client-supplied directory components.
        let file_name = std::path::Path::new(&file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .ok_or_else(|| bad_request("upload filename must not be empty"))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let upload_dir = state.config.upload_dir();
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .map_err(|e| internal(format!("failed to create upload dir: {}", e)))?;

        let dest = upload_dir.join(&file_name);
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| internal(format!("file upload failed: {}", e)))?;

        let started = state
            .ingest
            .spawn(
                state.config.clone(),
                state.embedder.clone() as Arc<dyn Embedder>,
            )
            .await;

        let message = if started {
            "File uploaded successfully and ingestion started".to_string()
        } else {
            "File uploaded successfully; a sync is already running".to_string()
        };

        return Ok(Json(UploadResponse {
            filename: file_name,
            message,
        }));
    }

    Err(bad_request("multipart body contained no file field"))
}

// ============ POST /ingest ============

#[derive(Serialize)]
struct IngestResponse {
    status: String,
}

async fn handle_ingest(State(state): State<AppState>) -> Result<Json<IngestResponse>, AppError> {
    let started = state
        .ingest
        .spawn(
            state.config.clone(),
            state.embedder.clone() as Arc<dyn Embedder>,
        )
        .await;

    if !started {
        return Err(conflict("a sync is already running"));
    }

    Ok(Json(IngestResponse {
        status: "Ingestion started in background.".to_string(),
    }))
}

// ============ GET /ingest/status ============

async fn handle_ingest_status(State(state): State<AppState>) -> Json<IngestJob> {
    Json(state.ingest.snapshot().await)
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResultBody {
    page_content: String,
    metadata: serde_json::Map<String, serde_json::Value>,
    score: f32,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchResultBody>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let results = query::run_search(
        &state.config,
        state.embedder.as_ref(),
        &req.query,
        req.k,
    )
    .await
    .map_err(classify_error)?;

    let results = results
        .into_iter()
        .map(|c| SearchResultBody {
            page_content: c.text,
            metadata: c.metadata,
            score: c.score,
        })
        .collect();

    Ok(Json(SearchResponse {
        query: req.query,
        results,
    }))
}

// ============ POST /qa ============

#[derive(Deserialize)]
struct QaRequest {
    question: String,
}

#[derive(Serialize)]
struct QaResponse {
    question: String,
    answer: String,
}

async fn handle_qa(
    State(state): State<AppState>,
    Json(req): Json<QaRequest>,
) -> Result<Json<QaResponse>, AppError> {
    let answer = query::run_answer(
        &state.config,
        state.embedder.as_ref(),
        state.llm.as_ref(),
        &req.question,
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(QaResponse {
        question: req.question,
        answer,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_validation_to_bad_request() {
        let err = classify_error(anyhow::anyhow!("query must not be empty"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "bad_request");
    }

    #[test]
    fn classify_maps_other_errors_to_internal() {
        let err = classify_error(anyhow::anyhow!("provider exploded"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("provider exploded"));
    }
}
