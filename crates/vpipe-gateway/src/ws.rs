//! WebSocket subscriber handling.
//!
//! A client connects, sends `{"join": "<videoId>"}`, and from then on
//! receives `videoStatus` events for that video: an immediate recap
//! when a status record already exists, live pushes afterwards. One
//! room per connection.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use vpipe_models::{StatusEvent, VideoId};

use crate::state::AppState;

/// Configuration for WebSocket backpressure.
const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// First frame a client must send.
#[derive(Debug, Deserialize)]
struct JoinRequest {
    join: VideoId,
}

/// Send a status event with backpressure handling.
async fn send_event(tx: &mpsc::Sender<Message>, event: &StatusEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(_) => return false,
    };
    match tx.try_send(Message::Text(json.clone())) {
        Ok(_) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("WebSocket send buffer full, applying backpressure");
            tx.send(Message::Text(json)).await.is_ok()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// WebSocket watch endpoint.
pub async fn ws_watch(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_watch_socket(socket, state))
}

/// Handle one subscriber connection.
async fn handle_watch_socket(socket: WebSocket, state: AppState) {
    let (ws_sender, mut receiver) = socket.split();

    // Bounded channel so a slow client cannot block the registry
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);

    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Wait for the join frame with a timeout
    let request: JoinRequest =
        match tokio::time::timeout(WS_CLIENT_TIMEOUT, receiver.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str(&text) {
                Ok(req) => req,
                Err(e) => {
                    warn!("Invalid join message: {}", e);
                    drop(tx);
                    let _ = send_task.await;
                    return;
                }
            },
            Ok(_) | Err(_) => {
                debug!("Client closed or timed out before joining a room");
                drop(tx);
                let _ = send_task.await;
                return;
            }
        };

    let video_id = request.join;
    info!("Subscriber joined room for video {}", video_id);

    let (mut room_rx, recap) = state.registry.join(&video_id).await;

    // Late joiners learn the outcome immediately
    if let Some(event) = recap {
        if !send_event(&tx, &event).await {
            drop(tx);
            let _ = send_task.await;
            return;
        }
    }

    loop {
        tokio::select! {
            event = room_rx.recv() => match event {
                Ok(event) => {
                    if !send_event(&tx, &event).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Subscriber for {} lagged, skipped {} events", video_id, n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // One room per connection; further frames are ignored
                    debug!("Ignoring extra client frame for {}", video_id);
                }
                Some(Err(e)) => {
                    debug!("WebSocket receive error for {}: {}", video_id, e);
                    break;
                }
            }
        }
    }

    drop(tx);
    let _ = send_task.await;
    debug!("Subscriber for {} disconnected", video_id);
}
