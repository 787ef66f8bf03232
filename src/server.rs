//! Report HTTP server.
//!
//! Serves stored report documents either as rendered HTML or as the exact
//! bytes they were uploaded as, and accepts authenticated uploads that
//! replace a document wholesale.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Index of stored documents |
//! | `GET`  | `/health` | Health check (returns version and backend) |
//! | `GET`  | `/{docpath}` | Stored bytes if `Accept: application/json`, otherwise HTML |
//! | `POST` | `/{docpath}` | Replace `data/{docpath}.json` with the request body |
//!
//! # Authorization
//!
//! Uploads must carry an `X-API-Key` header equal to `server.api_key`.
//! Anything else gets `403` with an empty body and leaves storage untouched.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no document: foo" } }
//! ```
//!
//! Error codes: `not_found` (404), `invalid_record` (500), `storage_error` (500).

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::render;
use crate::store::{self, datafile, Storage};
use crate::views::{ListView, RecordError};

/// Header carrying the upload key.
pub const API_KEY_HEADER: &str = "x-api-key";

const CONTENT_TYPE_JSON: &str = "application/json";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    /// The backend chosen at startup; shared by every request.
    store: Arc<dyn Storage>,
}

/// Starts the report server on `[server].bind` with the configured backend.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = store::open(config).await?;
    run_server_with_store(config, store).await
}

/// Starts the report server against an already-opened backend.
pub async fn run_server_with_store(
    config: &Config,
    store: Arc<dyn Storage>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let backend = store.name().to_string();
    let app = router(Arc::new(config.clone()), store);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(backend = %backend, "Report server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the route table.
pub fn router(config: Arc<Config>, store: Arc<dyn Storage>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/{docpath}", get(handle_read).post(handle_write))
        .layer(cors)
        .with_state(AppState { config, store })
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn storage_error(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "storage_error",
        message: format!("{:#}", err),
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "invalid_record",
            message: err.to_string(),
        }
    }
}

/// Docpaths become file names, so only plain names are accepted.
fn is_valid_docpath(docpath: &str) -> bool {
    !docpath.is_empty()
        && docpath
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn checked_docpath(docpath: String) -> Result<String, AppError> {
    if is_valid_docpath(&docpath) {
        Ok(docpath)
    } else {
        Err(not_found(format!("no such report: {}", docpath)))
    }
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == CONTENT_TYPE_JSON)
        .unwrap_or(false)
}

fn has_api_key(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    backend: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.store.name().to_string(),
    })
}

// ============ GET / ============

async fn handle_index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let files = state.store.list_files().await.map_err(storage_error)?;
    Ok(Html(render::render_index(&files)))
}

// ============ GET /{docpath} ============

/// Raw JSON passthrough when the client asks for exactly `application/json`;
/// otherwise the HTML page of whichever view the registry names.
async fn handle_read(
    State(state): State<AppState>,
    Path(docpath): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let docpath = checked_docpath(docpath)?;

    if accepts_json(&headers) {
        let path = datafile(&docpath);
        let content = state
            .store
            .retrieve(&path)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| not_found(format!("no document: {}", docpath)))?;
        debug!(docpath = %docpath, bytes = content.len(), "serving raw json");
        return Ok(([(header::CONTENT_TYPE, CONTENT_TYPE_JSON)], content).into_response());
    }

    let view_config = state.config.view(&docpath);
    let view = ListView::load(state.store.as_ref(), &docpath, &view_config).await?;
    debug!(docpath = %docpath, view = view.kind().as_str(), records = view.len(), "rendering");
    Ok(Html(render::render_view(&view)).into_response())
}

// ============ POST /{docpath} ============

/// Stores the request body verbatim, whatever its bytes. No validation
/// happens here; a malformed upload simply renders as an empty report later.
async fn handle_write(
    State(state): State<AppState>,
    Path(docpath): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    if !has_api_key(&headers, &state.config.server.api_key) {
        warn!(docpath = %docpath, "rejected upload with missing or incorrect API key");
        return Ok(StatusCode::FORBIDDEN);
    }

    let docpath = checked_docpath(docpath)?;
    let path = datafile(&docpath);
    state
        .store
        .store(&path, &body)
        .await
        .map_err(storage_error)?;

    info!(docpath = %docpath, bytes = body.len(), backend = state.store.name(), "stored document");
    Ok(StatusCode::OK)
}
