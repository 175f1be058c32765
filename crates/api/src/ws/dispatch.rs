//! Client message dispatch.
//!
//! Every inbound text frame is decoded as a [`ClientMessage`] and handled
//! against the connection's room state. Failures are reported to the sender
//! as an `error` message; the connection always stays open.

use harmonic_core::collaboration::{error_codes, ClientMessage, CursorPosition, ServerMessage};
use harmonic_core::error::CoreError;
use harmonic_core::types::DbId;
use harmonic_core::universe::ParameterKind;

use crate::error::AppError;
use crate::parameters::{load_viewable, update_parameters};
use crate::state::AppState;

/// Handle one inbound text frame from `conn_id`.
pub async fn handle_text(state: &AppState, conn_id: &str, user_id: DbId, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "Malformed WebSocket message");
            reply(
                state,
                conn_id,
                ServerMessage::error(error_codes::BAD_MESSAGE, format!("Invalid message: {e}")),
            )
            .await;
            return;
        }
    };

    let result = match message {
        ClientMessage::Join { universe_id } => join(state, conn_id, user_id, universe_id).await,
        ClientMessage::Leave { universe_id } => leave(state, conn_id, universe_id).await,
        ClientMessage::ParameterUpdate {
            universe_id,
            kind,
            parameters,
        } => parameter_update(state, conn_id, user_id, universe_id, kind, parameters).await,
        ClientMessage::CursorUpdate {
            universe_id,
            position,
        } => cursor_update(state, conn_id, user_id, universe_id, position).await,
        ClientMessage::Heartbeat { .. } => Ok(Some(ServerMessage::HeartbeatResponse {
            timestamp: chrono::Utc::now().to_rfc3339(),
        })),
    };

    let response = match result {
        Ok(Some(response)) => response,
        Ok(None) => return,
        Err(Rejection::NotInRoom(universe_id)) => ServerMessage::error(
            error_codes::NOT_IN_ROOM,
            format!("Not joined to universe {universe_id}"),
        ),
        Err(Rejection::App(err)) => {
            let (_, code, message) = err.classify();
            ServerMessage::error(code, message)
        }
    };
    reply(state, conn_id, response).await;
}

/// Answer a binary frame. The protocol is JSON text only; the connection
/// stays open.
pub async fn handle_binary(state: &AppState, conn_id: &str) {
    tracing::debug!(conn_id = %conn_id, "Binary WebSocket frame rejected");
    reply(
        state,
        conn_id,
        ServerMessage::error(
            error_codes::BAD_MESSAGE,
            "Binary frames are not supported; send JSON text frames",
        ),
    )
    .await;
}

/// Why a message was refused.
enum Rejection {
    NotInRoom(DbId),
    App(AppError),
}

impl From<AppError> for Rejection {
    fn from(err: AppError) -> Self {
        Rejection::App(err)
    }
}

impl From<CoreError> for Rejection {
    fn from(err: CoreError) -> Self {
        Rejection::App(err.into())
    }
}

/// `Ok(None)` means the handler already sent everything it needed to.
type Handled = Result<Option<ServerMessage>, Rejection>;

async fn reply(state: &AppState, conn_id: &str, message: ServerMessage) {
    if !state.ws_manager.send_to(conn_id, &message).await {
        tracing::debug!(conn_id = %conn_id, "Reply dropped, connection gone");
    }
}

async fn require_room(state: &AppState, conn_id: &str, universe_id: DbId) -> Result<(), Rejection> {
    if state.ws_manager.is_in_room(conn_id, universe_id).await {
        Ok(())
    } else {
        Err(Rejection::NotInRoom(universe_id))
    }
}

async fn join(state: &AppState, conn_id: &str, user_id: DbId, universe_id: DbId) -> Handled {
    load_viewable(state, universe_id, user_id).await?;

    let outcome = state
        .ws_manager
        .join_room(conn_id, universe_id)
        .await
        .ok_or_else(|| AppError::InternalError(format!("connection {conn_id} not registered")))?;

    if !outcome.already_joined {
        tracing::info!(conn_id = %conn_id, user_id, universe_id, "Joined universe room");
    }

    Ok(Some(ServerMessage::JoinResponse {
        universe_id,
        status: "joined".to_string(),
        members: outcome.members,
    }))
}

async fn leave(state: &AppState, conn_id: &str, universe_id: DbId) -> Handled {
    if !state.ws_manager.leave_room(conn_id, universe_id).await {
        return Err(Rejection::NotInRoom(universe_id));
    }
    tracing::info!(conn_id = %conn_id, universe_id, "Left universe room");
    Ok(Some(ServerMessage::LeaveResponse {
        universe_id,
        status: "left".to_string(),
    }))
}

async fn parameter_update(
    state: &AppState,
    conn_id: &str,
    user_id: DbId,
    universe_id: DbId,
    kind: ParameterKind,
    parameters: serde_json::Value,
) -> Handled {
    require_room(state, conn_id, universe_id).await?;
    // The sender receives the broadcast like every other member.
    update_parameters(state, universe_id, user_id, kind, parameters).await?;
    Ok(None)
}

async fn cursor_update(
    state: &AppState,
    conn_id: &str,
    user_id: DbId,
    universe_id: DbId,
    position: CursorPosition,
) -> Handled {
    require_room(state, conn_id, universe_id).await?;
    let message = ServerMessage::CursorUpdated {
        universe_id,
        user_id,
        position,
    };
    state
        .ws_manager
        .broadcast_to_room(universe_id, &message, Some(conn_id))
        .await;
    Ok(None)
}
