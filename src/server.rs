//!
//! cubby HTTP server
//! -----------------
//! This module defines the Axum-based HTTP API for cubby.
//!
//! Responsibilities:
//! - Account registration and password login issuing bearer session tokens.
//! - Token-gated file upload, fetch, listing and sharing endpoints.
//! - Wiring the store handles into the auth and sharing services at startup;
//!   handlers see only the injected `AppState`, no process-wide singletons.
//!
//! The session token travels in the custom `x-session-token` request header.
//! Error bodies are short generic messages; store-level details stay in the
//! logs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::AppError;
use crate::identity::{Account, AuthService, Session};
use crate::sharing::FileService;
use crate::storage::{FsObjectStore, JsonKv, MemKv, ObjectStore, RecordStore};

const SESSION_HEADER: &str = "x-session-token";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub files: Arc<FileService>,
}

/// Build the store handles under `data_root` (accounts table and object
/// folder are created on first run) and wire them into the services.
pub fn app_state(data_root: &str) -> anyhow::Result<AppState> {
    std::fs::create_dir_all(data_root)?;

    let accounts: Arc<dyn RecordStore<Account>> =
        Arc::new(JsonKv::<Account>::load_or_default(Path::new(data_root).join("accounts.json"))?);
    let sessions: Arc<dyn RecordStore<Session>> = Arc::new(MemKv::new());
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(Path::new(data_root).join("objects"))?);

    Ok(AppState {
        auth: Arc::new(AuthService::new(accounts.clone(), sessions)),
        files: Arc::new(FileService::new(objects, accounts)),
    })
}

/// Mount all HTTP routes over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "cubby ok" }))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/file", put(upload_file).get(get_file))
        .route("/files", get(list_files))
        .route("/share", post(share_file))
        .with_state(state)
}

/// Start the cubby HTTP server bound to the given port.
pub async fn run_with_port(http_port: u16, data_root: &str) -> anyhow::Result<()> {
    let app = router(app_state(data_root)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point using the default port (7878) and data root "data".
pub async fn run() -> anyhow::Result<()> {
    run_with_port(7878, "data").await
}

#[derive(Debug, Deserialize)]
struct CredentialsPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct FileUploadPayload {
    file_name: String,
    /// Base64-encoded file content.
    content: String,
}

#[derive(Debug, Deserialize)]
struct SharePayload {
    file_name: String,
    username: String,
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}

fn auth_identity(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let Some(token) = session_token(headers) else {
        return Err(AppError::auth("no_session", "No active session"));
    };
    state.auth.resolve(&token)
}

fn parse_body<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|_| AppError::validation("invalid_body", "Invalid request body"))
}

fn ok_response() -> Response {
    (StatusCode::OK, Json(json!({"status":"ok"}))).into_response()
}

fn error_response(err: &AppError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if matches!(err, AppError::Internal { .. }) {
        // Store faults are logged in full but never surfaced to callers.
        error!("internal error: {err}");
        return (status, Json(json!({"status":"error","error":"Internal error"}))).into_response();
    }
    (status, Json(json!({"status":"error","error": err.message()}))).into_response()
}

async fn register(State(state): State<AppState>, Json(body): Json<serde_json::Value>) -> Response {
    let payload: CredentialsPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    match state.auth.register(&payload.username, &payload.password) {
        Ok(()) => ok_response(),
        Err(e) => error_response(&e),
    }
}

async fn login(State(state): State<AppState>, Json(body): Json<serde_json::Value>) -> Response {
    let payload: CredentialsPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    match state.auth.login(&payload.username, &payload.password) {
        Ok(token) => (StatusCode::OK, Json(json!({"token": token}))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    // Idempotent: an absent or unknown token still logs out cleanly.
    if let Some(token) = session_token(&headers) {
        if let Err(e) = state.auth.logout(&token) {
            return error_response(&e);
        }
    }
    ok_response()
}

async fn upload_file(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<serde_json::Value>) -> Response {
    let identity = match auth_identity(&state, &headers) {
        Ok(u) => u,
        Err(e) => return error_response(&e),
    };
    let payload: FileUploadPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let content = match base64::engine::general_purpose::STANDARD.decode(payload.content.as_bytes()) {
        Ok(bytes) => bytes,
        Err(_) => return error_response(&AppError::validation("invalid_body", "Invalid request body")),
    };
    match state.files.upload(&identity, &payload.file_name, &content) {
        Ok(()) => ok_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let identity = match auth_identity(&state, &headers) {
        Ok(u) => u,
        Err(e) => return error_response(&e),
    };
    let Some(file_name) = params.get("file_name") else {
        return error_response(&AppError::validation("missing_param", "Missing query parameter"));
    };
    let owner = params.get("username").map(|s| s.as_str());
    match state.files.fetch(&identity, file_name, owner) {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_files(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = match auth_identity(&state, &headers) {
        Ok(u) => u,
        Err(e) => return error_response(&e),
    };
    match state.files.list(&identity) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn share_file(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<serde_json::Value>) -> Response {
    let identity = match auth_identity(&state, &headers) {
        Ok(u) => u,
        Err(e) => return error_response(&e),
    };
    let payload: SharePayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    match state.files.share(&identity, &payload.file_name, &payload.username) {
        Ok(()) => ok_response(),
        Err(e) => error_response(&e),
    }
}
