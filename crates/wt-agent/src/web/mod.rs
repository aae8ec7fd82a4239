//! Web UI server: shell page, static assets, terminal and file routes
//!
//! Every route is mounted under `/{name}` so the remote tunnel server can
//! route by path prefix. Only the shell page is behind basic auth.

mod assets;
mod auth;
mod files;
mod terminal;

pub use assets::{content_type, inject_sub_path, AssetSource, DirAssets, EmbeddedAssets};
pub use auth::{basic_auth_matches, AUTH_REALM};
pub use files::{
    FileEntry, FileError, FileTransfer, LocalFiles, UploadProgress, UPLOAD_PROGRESS_TTL,
};
pub use terminal::{ClientMessage, LocalShell, SessionContext, TerminalBackend};

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use wt_core::Config;

/// JSON envelope returned by the API routes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    /// 0 on success
    pub code: i32,
    pub msg: String,
    pub data: Value,
}

impl ResponseBody {
    pub fn success(data: Value) -> Self {
        Self {
            code: 0,
            msg: "success".to_string(),
            data,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            code: 1,
            msg: msg.into(),
            data: Value::Null,
        }
    }
}

/// Shared state of the web routes
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub assets: Arc<dyn AssetSource>,
    pub terminal: Arc<dyn TerminalBackend>,
    pub files: Arc<dyn FileTransfer>,
    /// Fires when the server shuts down; ends open terminal sessions and
    /// transfers
    pub cancel: CancellationToken,
}

/// Build the router for `state.config.name`
pub fn router(state: AppState) -> Router {
    let base = state.config.base_path();

    Router::new()
        .route(&base, get(index))
        .route(&format!("{}/", base), get(index))
        .route(&format!("{}/static/*path", base), get(static_asset))
        .route(&format!("{}/term", base), get(terminal_ws))
        .route(&format!("{}/check", base), get(check))
        .route(&format!("{}/file/list", base), get(file_list))
        .route(&format!("{}/file/download", base), get(file_download))
        .route(
            &format!("{}/file/upload", base),
            post(file_upload).layer(DefaultBodyLimit::disable()),
        )
        .route(&format!("{}/file/progress", base), get(file_progress))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let config = &state.config;
    if config.requires_auth()
        && !basic_auth_matches(&headers, &config.username, &config.password)
    {
        return auth::challenge();
    }

    match state.assets.index().await {
        Ok(html) => Html(inject_sub_path(&html, &config.name)).into_response(),
        Err(e) => {
            tracing::error!("Failed to load index.html: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn static_asset(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match state.assets.get(&path).await {
        Ok(Some(body)) => ([(header::CONTENT_TYPE, content_type(&path))], body).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::warn!("Failed to load asset {}: {}", path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn terminal_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let backend = state.terminal.clone();
    let ctx = SessionContext {
        timeout: state.config.timeout,
        cancel: state.cancel.clone(),
    };
    ws.on_upgrade(move |socket| async move { backend.session(socket, ctx).await })
}

async fn check(State(state): State<AppState>) -> Json<ResponseBody> {
    let mut body = state.terminal.check().await;
    let save_pass = json!(state.config.save_pass);
    match &mut body.data {
        Value::Object(map) => {
            map.insert("savePass".to_string(), save_pass);
        }
        other => *other = json!({ "savePass": save_pass }),
    }
    Json(body)
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    #[serde(default)]
    id: String,
}

async fn file_list(State(state): State<AppState>, Query(q): Query<PathQuery>) -> Json<ResponseBody> {
    Json(state.files.list(&q.path).await)
}

/// How often the progress socket checks for changes
const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

async fn file_download(State(state): State<AppState>, Query(q): Query<PathQuery>) -> Response {
    let (parts, body) = state.files.download(&q.path).await.into_parts();
    // Cut the body short on shutdown
    let body = body
        .into_data_stream()
        .take_until(state.cancel.clone().cancelled_owned());
    Response::from_parts(parts, Body::from_stream(body))
}

async fn file_upload(State(state): State<AppState>, multipart: Multipart) -> Json<ResponseBody> {
    tokio::select! {
        body = state.files.upload(multipart) => Json(body),
        _ = state.cancel.cancelled() => {
            tracing::debug!("Upload interrupted by shutdown");
            Json(ResponseBody::failure("Server is shutting down"))
        }
    }
}

/// Progress snapshot, or a WebSocket pushing snapshots until the upload is done
async fn file_progress(
    State(state): State<AppState>,
    Query(q): Query<ProgressQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    match ws {
        Some(ws) => ws.on_upgrade(move |socket| push_progress(socket, state, q.id)),
        None => Json(state.files.progress(&q.id)).into_response(),
    }
}

async fn push_progress(mut socket: WebSocket, state: AppState, id: String) {
    let mut last = None;
    loop {
        let body = state.files.progress(&id);
        let finished = body.code != 0 || body.data["done"] == json!(true);
        let text = match serde_json::to_string(&body) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to encode upload progress: {}", e);
                break;
            }
        };

        if last.as_ref() != Some(&text) {
            if socket.send(Message::Text(text.clone())).await.is_err() {
                return;
            }
            last = Some(text);
        }
        if finished {
            break;
        }

        tokio::select! {
            _ = state.cancel.cancelled() => break,
            _ = tokio::time::sleep(PROGRESS_INTERVAL) => {}
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}
