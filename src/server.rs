//!
//! tonearm HTTP server
//! -------------------
//! Axum-based HTTP API for the media library.
//!
//! Responsibilities:
//! - Login endpoint minting signed session tokens, with a fixed response
//!   delay on every failure.
//! - The access gate middleware over every protected route.
//! - Directory listing and recursive scan endpoints built on the virtual
//!   path resolver.
//! - Share-grant minting, gated download and media fetch, and the invite
//!   exchange acknowledgement.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path as RoutePath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::explorer;
use crate::identity::{self, Principal, TokenCodec, TokenPayload};
use crate::security;
use crate::vpath;

/// Applied before every failed login response. A contract, not a tunable:
/// it blunts brute-force automation and keeps bad-username and bad-password
/// timings identical.
const LOGIN_FAILURE_DELAY: Duration = Duration::from_millis(800);

/// Shared server state injected into all handlers. Everything inside is
/// read-only after startup, so requests never contend.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: TokenCodec,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let tokens = TokenCodec::new(&config.secret);
        Self { config: Arc::new(config), tokens }
    }
}

/// Mount all routes. Everything merged behind the gate layer requires a
/// `Principal`; the login endpoint and the health probe stay outside.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/file-explorer", post(file_explorer))
        .route("/api/v1/file-explorer/recursive", post(file_explorer_recursive))
        .route("/api/v1/share", post(make_share))
        .route(identity::DOWNLOAD_PATH, post(download))
        .route("/media/{*path}", get(media))
        .route(identity::INVITE_EXCHANGE_PATH, post(invite_exchange))
        .route_layer(middleware::from_fn_with_state(state.clone(), identity::access_gate));

    Router::new()
        .route("/", get(|| async { "tonearm ok" }))
        .route("/api/v1/auth/login", post(login))
        .merge(protected)
        .with_state(state)
}

fn log_startup(config: &Config) {
    info!(
        target: "startup",
        "tonearm starting: {} account(s), {} folder(s), port={}",
        config.users.len(),
        config.folders.len(),
        config.port
    );
    for (name, dir) in &config.folders {
        info!(target: "startup", "folder '{}' -> {}", name, dir.display());
    }
    if config.no_users() {
        warn!(target: "startup", "no users configured; running in open single-operator mode");
    }
}

pub async fn run_with_port(config: Config, port: u16) -> anyhow::Result<()> {
    log_startup(&config);
    let state = AppState::new(config);
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("tonearm listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point using the port from the config file.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let port = config.port;
    run_with_port(config, port).await
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ExplorerPayload {
    directory: String,
    #[serde(default = "default_sort")]
    sort: bool,
}

fn default_sort() -> bool { true }

#[derive(Debug, Deserialize)]
struct RecursivePayload {
    directory: String,
}

#[derive(Debug, Deserialize)]
struct SharePayload {
    files: Vec<String>,
    #[serde(default)]
    expire_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DownloadPayload {
    file: String,
}

fn client_origin(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Login runs before the gate: it is how a token is first obtained. Every
/// failure, whatever the cause, is logged with the caller's origin and then
/// answered uniformly after the fixed delay.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let creds: Option<LoginPayload> = serde_json::from_slice(&body).ok();

    if let Some(creds) = creds {
        if security::authenticate(&state.config, &creds.username, &creds.password) {
            if let Some(account) = state.config.lookup(&creds.username) {
                let token = state.tokens.issue(&TokenPayload::User { username: creds.username.clone() });
                return (
                    StatusCode::OK,
                    Json(json!({ "vpaths": account.vpaths, "token": token })),
                );
            }
        }
        warn!(
            "Failed login attempt from {}. Username: {}",
            client_origin(&headers),
            creds.username
        );
    } else {
        warn!(
            "Failed login attempt from {}. Username: <malformed request>",
            client_origin(&headers)
        );
    }

    sleep(LOGIN_FAILURE_DELAY).await;
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Login Failed" })))
}

async fn file_explorer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let req_data: ExplorerPayload =
        serde_json::from_value(payload).map_err(|e| AppError::validation(e.to_string()))?;

    // Top-level request: the caller's vpaths are the directories. This path
    // never touches the filesystem and never calls the resolver.
    if req_data.directory.is_empty() || req_data.directory == "/" {
        let mut names: Vec<&String> = principal.vpaths().map(|v| v.iter().collect()).unwrap_or_default();
        names.sort();
        let directories: Vec<_> = names.into_iter().map(|n| json!({ "name": n })).collect();
        return Ok(Json(json!({ "path": "/", "directories": directories, "files": [] })));
    }

    let resolved = vpath::resolve(&req_data.directory, &principal, &state.config)
        .map_err(|e| AppError::explore(e.to_string()))?;
    let contents = explorer::directory_contents(
        &resolved.real_path,
        &state.config.supported_media_types,
        req_data.sort,
    )
    .map_err(|e| AppError::explore(e.to_string()))?;

    Ok(Json(json!({
        "path": normalize_virtual_dir(&resolved.vpath, &resolved.relative_path),
        "files": contents.files,
        "directories": contents.directories,
    })))
}

async fn file_explorer_recursive(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let req_data: RecursivePayload =
        serde_json::from_value(payload).map_err(|e| AppError::validation(e.to_string()))?;
    if req_data.directory.is_empty() {
        return Err(AppError::validation("directory must not be empty"));
    }

    let resolved = vpath::resolve(&req_data.directory, &principal, &state.config)
        .map_err(|e| AppError::explore(e.to_string()))?;
    let files = explorer::recursive_scan(
        &resolved.real_path,
        &state.config.supported_media_types,
        &resolved.vpath,
        &resolved.relative_path,
    )
    .map_err(|e| AppError::explore(e.to_string()))?;

    Ok(Json(json!(files)))
}

/// Mint a share grant over an explicit file list. Every file must resolve
/// through the caller's own namespace, so a grant can never name anything
/// its minter could not reach.
async fn make_share(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let req_data: SharePayload =
        serde_json::from_value(payload).map_err(|e| AppError::validation(e.to_string()))?;
    if req_data.files.is_empty() {
        return Err(AppError::validation("files must not be empty"));
    }
    if principal.vpaths().is_none() {
        return Err(AppError::denied("share and invite grants cannot mint shares"));
    }
    if let Some(days) = req_data.expire_days {
        if !(1..=3650).contains(&days) {
            return Err(AppError::validation("expire_days out of range"));
        }
    }

    let mut allowed = Vec::with_capacity(req_data.files.len());
    for file in &req_data.files {
        let resolved = vpath::resolve(file, &principal, &state.config)
            .map_err(|e| AppError::denied(format!("share request for '{}': {}", file, e)))?;
        let meta = std::fs::metadata(&resolved.real_path)
            .map_err(|_| AppError::validation(format!("shared file does not exist: {}", file)))?;
        if !meta.is_file() {
            return Err(AppError::validation(format!("shared path is not a file: {}", file)));
        }
        allowed.push(virtual_file_key(&resolved.vpath, &resolved.relative_path));
    }

    let grant = TokenPayload::Share { allowed_files: allowed.clone() };
    let token = match req_data.expire_days {
        Some(days) => state
            .tokens
            .issue_expiring(&grant, Utc::now() + chrono::Duration::days(days)),
        None => state.tokens.issue(&grant),
    };
    info!("user '{}' minted a share grant over {} file(s)", principal.username(), allowed.len());

    Ok(Json(json!({ "token": token, "allowed_files": allowed })))
}

async fn download(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Response> {
    let req_data: DownloadPayload =
        serde_json::from_value(payload).map_err(|e| AppError::validation(e.to_string()))?;
    let requested = req_data.file.replace('\\', "/");

    // A share grant may only fetch the files it names; user contexts fall
    // through to plain resolution.
    if let Some(allowed) = principal.allowed_files() {
        let key = requested.trim_start_matches('/');
        if !allowed.contains(key) {
            return Err(AppError::denied(format!("share grant does not name '{}'", key)));
        }
    }

    let resolved = vpath::resolve(&requested, &principal, &state.config)
        .map_err(|e| AppError::explore(e.to_string()))?;
    let bytes = tokio::fs::read(&resolved.real_path)
        .await
        .map_err(|e| AppError::explore(e.to_string()))?;
    let filename = resolved
        .real_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
    ];
    Ok((headers, bytes).into_response())
}

async fn media(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    RoutePath(rest): RoutePath<String>,
) -> AppResult<Response> {
    let resolved = vpath::resolve(&rest, &principal, &state.config)
        .map_err(|e| AppError::explore(e.to_string()))?;
    let bytes = tokio::fs::read(&resolved.real_path)
        .await
        .map_err(|e| AppError::explore(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

/// The gate admits only invite grants (and unrestricted user sessions) here.
/// The federation handshake itself lives outside this server's scope; the
/// exchange is acknowledged and nothing more.
async fn invite_exchange(Extension(principal): Extension<Principal>) -> Json<serde_json::Value> {
    info!("invite exchange acknowledged for '{}'", principal.username());
    Json(json!({ "status": "ok" }))
}

/// Normalized virtual directory string beginning and ending with '/'.
fn normalize_virtual_dir(vpath: &str, relative: &str) -> String {
    let mut out = String::from("/");
    out.push_str(vpath);
    for seg in relative.replace('\\', "/").split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(seg);
    }
    out.push('/');
    out
}

/// vpath-prefixed file key with no leading slash, the form share grants store.
fn virtual_file_key(vpath: &str, relative: &str) -> String {
    let mut key = vpath.to_string();
    for seg in relative.replace('\\', "/").split('/').filter(|s| !s.is_empty()) {
        key.push('/');
        key.push_str(seg);
    }
    key
}
