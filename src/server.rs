use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::state::AppState;
use crate::store::{parse_chat_id, StoreError};

/// Run the control API and WebSocket endpoint.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Control API listening on http://{addr}");
    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/keywords",
            get(list_keywords).post(add_keyword).delete(remove_keyword),
        )
        .route("/chats", get(list_chats).post(add_chat).delete(remove_chat))
        .route("/ws", get(ws_upgrade))
        .layer(middleware::from_fn(permissive_cors))
        .with_state(state)
}

// ── Request / response types ─────────────────────────────────────────────

#[derive(Deserialize)]
struct KeywordBody {
    keyword: String,
}

#[derive(Deserialize)]
struct ChatBody {
    chat_id: ChatIdParam,
}

/// Chat id payload: accepted as a JSON integer or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatIdParam {
    Int(i64),
    Text(String),
}

impl ChatIdParam {
    fn resolve(&self) -> Result<i64, StoreError> {
        match self {
            ChatIdParam::Int(id) => Ok(*id),
            ChatIdParam::Text(raw) => parse_chat_id(raw),
        }
    }
}

/// API-boundary error: a status code plus a `{"detail"}` body. Validation
/// errors map to 400, not-found errors to 404; nothing becomes a 500.
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::EmptyKeyword | StoreError::InvalidChatId(_) => StatusCode::BAD_REQUEST,
            StoreError::KeywordNotFound | StoreError::ChatNotFound => StatusCode::NOT_FOUND,
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

// ── Keyword endpoints ────────────────────────────────────────────────────

async fn list_keywords(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.keywords().await)
}

async fn add_keyword(
    State(state): State<Arc<AppState>>,
    Json(body): Json<KeywordBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let keyword = state.add_keyword(&body.keyword).await?;
    Ok(Json(json!({ "status": "success", "keyword": keyword })))
}

async fn remove_keyword(
    State(state): State<Arc<AppState>>,
    Json(body): Json<KeywordBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let keyword = state.remove_keyword(&body.keyword).await?;
    Ok(Json(json!({ "status": "success", "keyword": keyword })))
}

// ── Chat endpoints ───────────────────────────────────────────────────────

async fn list_chats(State(state): State<Arc<AppState>>) -> Json<Vec<i64>> {
    Json(state.chats().await)
}

async fn add_chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chat_id = state.add_chat(body.chat_id.resolve()?).await;
    Ok(Json(json!({ "status": "success", "chat_id": chat_id })))
}

async fn remove_chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chat_id = state.remove_chat(body.chat_id.resolve()?).await?;
    Ok(Json(json!({ "status": "success", "chat_id": chat_id })))
}

// ── CORS ─────────────────────────────────────────────────────────────────

// The API carries no credentials, so every origin/method/header is allowed
// (documented limitation of the control surface).
async fn permissive_cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(resp.headers_mut());
        return resp;
    }
    let mut resp = next.run(req).await;
    apply_cors_headers(resp.headers_mut());
    resp
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert("access-control-allow-methods", HeaderValue::from_static("*"));
    headers.insert("access-control-allow-headers", HeaderValue::from_static("*"));
}

// ── Live channel ─────────────────────────────────────────────────────────

async fn ws_upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| subscriber_loop(socket, state))
}

/// Forward broadcast events to one subscriber until it disconnects.
/// Inbound frames are read and discarded; the channel is push-only.
async fn subscriber_loop(socket: WebSocket, state: Arc<AppState>) {
    let (id, mut rx) = state.events.register().await;
    info!(
        "Live subscriber {id} connected ({} active)",
        state.events.subscriber_count().await
    );

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(payload) => {
                        if sink.send(WsMessage::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    state.events.unregister(id).await;
    info!("Live subscriber {id} disconnected");
}
