//! Telemetry WebSocket endpoint.
//!
//! A client connecting to `/ws` gets the `ACK` text frame, then is added to
//! the client registry and receives every telemetry frame broadcast from
//! then on. Anything the client sends is ignored apart from close and ping.
//!
//! Each client owns a bounded frame queue. When the queue overflows the
//! registry drops the client, which ends this connection task. Clearing the
//! registry ends every connection the same way. A single write that stalls
//! past the send timeout also ends the connection.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{Sink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sensorlink_protocol::ACK_FRAME;

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

/// GET /ws
async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let limit = state.client_send_timeout;
    if let Err(e) = send_frame(&mut ws_tx, Message::Text(ACK_FRAME.to_string()), limit).await {
        warn!("Failed to greet WebSocket client: {}", e);
        return;
    }

    let (frame_tx, mut frame_rx) = mpsc::channel::<String>(state.client_queue_depth.max(1));
    let id = state.registry.register(Arc::new(frame_tx));
    info!("Telemetry client {} connected ({} total)", id, state.registry.len());

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} closed connection", id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if send_frame(&mut ws_tx, Message::Pong(data), limit).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error from {}: {}", id, e);
                        break;
                    }
                    _ => {}
                }
            }

            frame = frame_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = send_frame(&mut ws_tx, Message::Text(frame), limit).await {
                            debug!("Failed to send telemetry to {}: {}", id, e);
                            break;
                        }
                    }
                    None => {
                        // Dropped by the registry: too slow, or shutting down.
                        info!("Client {} dropped, disconnecting", id);
                        let _ = send_frame(&mut ws_tx, Message::Close(None), limit).await;
                        break;
                    }
                }
            }
        }
    }

    state.registry.unregister(id);
    info!("Telemetry client {} disconnected", id);
}

#[derive(Debug, Error)]
enum SendError {
    #[error("send stalled for {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Socket(String),
}

/// Send one message, giving up if the peer does not take it within `limit`.
async fn send_frame<S>(sink: &mut S, message: Message, limit: Duration) -> Result<(), SendError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match tokio::time::timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SendError::Socket(e.to_string())),
        Err(_) => Err(SendError::TimedOut(limit)),
    }
}
