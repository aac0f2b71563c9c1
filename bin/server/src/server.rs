use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::session::Session;
use crate::shared_state::SharedState;
use crate::{SERVER_NAME, SERVER_VERSION};

/// Outgoing-frame buffer per session. The writer task drains it into the
/// socket; a full buffer applies backpressure to request tasks.
const OUTGOING_BUFFER: usize = 64;

pub fn router(state: Arc<SharedState>) -> Router {
    let session_path = state.config.http.session_path.clone();
    Router::new()
        .route(&session_path, get(session_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<SharedState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
        "cache": serde_json::to_value(state.engine.cache_stats()).unwrap_or_default(),
    }))
}

async fn session_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SharedState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<SharedState>) {
    let (mut sink, mut stream) = socket.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<String>(OUTGOING_BUFFER);
    let session = Session::new(state, outgoing_tx);
    let session_id = session.id;

    let writer = tokio::spawn(async move {
        while let Some(frame) = outgoing_rx.recv().await {
            if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => session.handle_frame(text.as_str()).await,
            Ok(WsMessage::Close(_)) => {
                debug!("Session {session_id} received close frame");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!("Transport error on session {session_id}: {err}");
                break;
            }
        }
    }

    // Transport gone: cancel everything and stop the writer.
    session.close().await;
    writer.abort();
    info!("Session {session_id} disconnected");
}
