//! WebSocket change feed for real-time todo sync.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::model::{Todo, TodoWsMessage};
use super::routes::AppState;

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("Todo WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("Todo WebSocket client connected");

    let (mut rx, todos) = subscribe_with_snapshot(&state).await;
    if !send_json(&mut socket, &TodoWsMessage::TodosSync { todos }).await {
        warn!("Failed to send initial todo sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if !send_json(&mut socket, &msg).await {
                            debug!("Todo WS client disconnected during send");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Todo WS client lagged behind broadcast");
                        let (fresh, todos) = subscribe_with_snapshot(&state).await;
                        rx = fresh;
                        if !send_json(&mut socket, &TodoWsMessage::TodosSync { todos }).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Todo broadcast channel closed");
                        break;
                    }
                }
            }

            // The feed is one-way; client frames other than ping/close are ignored.
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Todo WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Todo WebSocket error");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(text = %text.as_str(), "Ignoring client message on todo feed");
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Todo WebSocket connection closed");
}

/// Subscribe and copy the list under one read lock.
///
/// Mutations publish while holding the write lock, so every event the
/// receiver yields happened after the snapshot.
async fn subscribe_with_snapshot(
    state: &AppState,
) -> (broadcast::Receiver<TodoWsMessage>, Vec<Todo>) {
    let store = state.store.read().await;
    (state.subscribe(), store.list().to_vec())
}

/// Returns `false` once the client is gone.
async fn send_json(socket: &mut WebSocket, msg: &TodoWsMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize todo WS message");
            true
        }
    }
}
