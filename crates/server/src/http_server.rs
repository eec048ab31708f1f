//! HTTP surface using Axum
//!
//! - `GET /js` serves the reload script
//! - `GET /ws` upgrades to the push channel
//! - everything else is served from the root directory, with a landing page
//!   at `/` when the root has no index

use crate::registry::{ClientRegistry, ReloadClient};
use crate::templates;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    handler::HandlerWithoutStateExt,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use reloadwatch_core::error::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, trace};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ClientRegistry>,
    pub root_dir: PathBuf,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: AppState) -> Router {
    let static_files =
        ServeDir::new(&state.root_dir).fallback(landing_page_handler.into_service());

    Router::new()
        .route("/js", get(reload_js_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Host the browser used to reach us, as given in the request
fn request_host(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost")
}

/// GET /js
async fn reload_js_handler(headers: HeaderMap) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        templates::reload_js(request_host(&headers)),
    )
}

/// Fallback for paths the root directory can't serve
async fn landing_page_handler(uri: Uri, headers: HeaderMap) -> Response {
    if uri.path() == "/" {
        Html(templates::index_html(request_host(&headers))).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.registry))
}

/// Register the connection, then wait for the browser to go away
///
/// Nothing meaningful is expected from the client; reading only detects the
/// disconnect.
async fn handle_socket(socket: WebSocket, registry: Arc<ClientRegistry>) {
    let (sink, mut stream) = socket.split();
    let id = registry.register(Box::new(WsClient { sink })).await;

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(other) => trace!("Ignoring message from {}: {:?}", id, other),
        }
    }

    if registry.unregister(id).await {
        debug!("{} disconnected", id);
    }
}

/// Sending half of a browser WebSocket
struct WsClient {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl ReloadClient for WsClient {
    async fn send_text(&mut self, message: &str) -> Result<()> {
        self.sink
            .send(Message::Text(message.to_owned().into()))
            .await
            .map_err(|e| Error::server(format!("Failed to push to websocket: {e}")))
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            trace!("Closing websocket failed: {}", e);
        }
    }
}
