use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use harmonic_core::types::DbId;

use crate::middleware::auth::WsAuthUser;
use crate::state::AppState;
use crate::ws::dispatch;

/// GET /api/ws -- authenticate, then upgrade the connection to WebSocket.
///
/// `WsAuthUser` runs first, so a missing or invalid token is answered with
/// 401 and the upgrade never happens.
pub async fn ws_handler(
    auth: WsAuthUser,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth.user_id))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Dispatches inbound text frames on the current task.
///   4. Leaves all rooms and deregisters on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: DbId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket connected");

    let ws_manager = state.ws_manager.clone();
    let mut rx = ws_manager.add(conn_id.clone(), user_id).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // The sender task ends when a Close is queued (prune or shutdown) or the
    // sink fails; either way the connection is finished.
    loop {
        let next = tokio::select! {
            _ = &mut send_task => break,
            next = stream.next() => next,
        };
        let Some(result) = next else { break };

        ws_manager.touch(&conn_id).await;
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => {
                dispatch::handle_text(&state, &conn_id, user_id, text.as_str()).await;
            }
            Ok(Message::Binary(_)) => {
                dispatch::handle_binary(&state, &conn_id).await;
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    let rooms = ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id, rooms = rooms.len(), "WebSocket disconnected");
}
