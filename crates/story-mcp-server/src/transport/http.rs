//! HTTP binding: SSE event streams plus direct JSON-RPC requests
//!
//! A client either opens `GET /sse` and POSTs follow-ups tagged with the
//! channel id it was handed (responses are pushed onto the stream, the POST
//! acknowledged with 202), or POSTs untagged requests and gets the response
//! back synchronously.

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use dashmap::DashMap;
use futures_util::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use story_mcp_core::{error_codes, Result, StoryMcpError};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handle_request;
use crate::StoryServer;
use crate::mcp::{Request, Response};

/// Open SSE channels, keyed by the token handed out in the endpoint event
pub struct ChannelRegistry {
    channels: DashMap<String, mpsc::UnboundedSender<String>>,
}

impl ChannelRegistry {
    fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn register(&self, id: String, tx: mpsc::UnboundedSender<String>) {
        self.channels.insert(id, tx);
    }

    fn get(&self, id: &str) -> Option<mpsc::UnboundedSender<String>> {
        self.channels.get(id).map(|e| e.value().clone())
    }

    /// Drop a channel whose receiver has gone away
    fn remove(&self, id: &str) {
        self.channels.remove(id);
    }
}

#[derive(Clone)]
struct AppState {
    server: Arc<StoryServer>,
    channels: Arc<ChannelRegistry>,
}

/// Serve the MCP protocol over HTTP until the listener fails
pub async fn serve(server: Arc<StoryServer>, listener: TcpListener) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| StoryMcpError::Protocol(format!("resolve listener addr: {e}")))?;

    let state = AppState {
        server,
        channels: Arc::new(ChannelRegistry::new()),
    };

    let app = Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages", post(message_handler))
        .with_state(state);

    info!(%addr, "story-mcp server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| StoryMcpError::Protocol(format!("HTTP server failed: {e}")))
}

async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let channel_id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    state.channels.register(channel_id.clone(), tx);
    info!(channel_id = %channel_id, "SSE channel opened");

    // First frame tells the client where to POST, tagged with its channel id
    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?session_id={channel_id}"));

    let responses = UnboundedReceiverStream::new(rx)
        .map(|data| Ok(Event::default().event("message").data(data)));
    let stream = tokio_stream::once(Ok(endpoint)).chain(responses);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    /// SSE channel token; absent for direct synchronous requests
    session_id: Option<String>,
}

async fn message_handler(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> axum::response::Response {
    let parsed: std::result::Result<Request, _> = serde_json::from_str(&body);

    match query.session_id {
        Some(channel_id) => {
            let Some(tx) = state.channels.get(&channel_id) else {
                return (StatusCode::NOT_FOUND, "Unknown channel").into_response();
            };

            // Processed off the request path; the POST only acknowledges
            // receipt. Responses land on the stream in processing order.
            let server = state.server.clone();
            let channels = state.channels.clone();
            tokio::spawn(async move {
                let response = match parsed {
                    Ok(request) => handle_request(&server, &request).await,
                    Err(e) => Some(parse_error(e)),
                };
                if let Some(response) = response {
                    push_response(&channels, &channel_id, &tx, &response);
                }
            });

            (StatusCode::ACCEPTED, "Accepted").into_response()
        }
        None => match parsed {
            Ok(request) => match handle_request(&state.server, &request).await {
                Some(response) => Json(response).into_response(),
                None => StatusCode::ACCEPTED.into_response(),
            },
            Err(e) => Json(parse_error(e)).into_response(),
        },
    }
}

fn parse_error(e: serde_json::Error) -> Response {
    Response::error(
        None,
        error_codes::PARSE_ERROR,
        format!("Parse error: {e}"),
    )
}

fn push_response(
    channels: &ChannelRegistry,
    channel_id: &str,
    tx: &mpsc::UnboundedSender<String>,
    response: &Response,
) {
    let serialized = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize response");
            return;
        }
    };
    if tx.send(serialized).is_err() {
        debug!(channel_id, "SSE receiver gone, dropping channel");
        channels.remove(channel_id);
    }
}
