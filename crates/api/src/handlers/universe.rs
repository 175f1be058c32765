//! Handlers for universe parameters and room presence.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use harmonic_core::collaboration::RoomMember;
use harmonic_core::types::DbId;
use harmonic_core::universe::{ParameterKind, UniverseParameters};
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::{json_body, path_param};
use crate::middleware::auth::AuthUser;
use crate::parameters::{load_viewable, update_parameters};
use crate::response::DataResponse;
use crate::state::AppState;

/// Users currently connected to a universe's room.
#[derive(Debug, Serialize)]
pub struct Presence {
    pub universe_id: DbId,
    pub members: Vec<RoomMember>,
}

/// GET /api/universes/{id}/parameters
pub async fn get_parameters(
    auth: AuthUser,
    State(state): State<AppState>,
    universe_id: Result<Path<DbId>, PathRejection>,
) -> AppResult<Json<DataResponse<UniverseParameters>>> {
    let universe_id = path_param(universe_id)?;
    let universe = load_viewable(&state, universe_id, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: universe.parameters(),
    }))
}

/// PUT /api/universes/{id}/physics
///
/// Body is a partial physics object. It is decoded only after the universe
/// is found and the caller is known to own it, so 404 and 403 take
/// precedence over a malformed patch. The merged result is validated,
/// stored and broadcast to the universe's room as `parameters_updated`.
pub async fn update_physics(
    auth: AuthUser,
    State(state): State<AppState>,
    universe_id: Result<Path<DbId>, PathRejection>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<Json<DataResponse<UniverseParameters>>> {
    let universe_id = path_param(universe_id)?;
    update_group(&state, universe_id, auth.user_id, ParameterKind::Physics, body).await
}

/// PUT /api/universes/{id}/harmony
pub async fn update_harmony(
    auth: AuthUser,
    State(state): State<AppState>,
    universe_id: Result<Path<DbId>, PathRejection>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<Json<DataResponse<UniverseParameters>>> {
    let universe_id = path_param(universe_id)?;
    update_group(&state, universe_id, auth.user_id, ParameterKind::Harmony, body).await
}

/// GET /api/universes/{id}/presence
pub async fn get_presence(
    auth: AuthUser,
    State(state): State<AppState>,
    universe_id: Result<Path<DbId>, PathRejection>,
) -> AppResult<Json<DataResponse<Presence>>> {
    let universe_id = path_param(universe_id)?;
    load_viewable(&state, universe_id, auth.user_id).await?;
    let members = state.ws_manager.room_members(universe_id).await;
    Ok(Json(DataResponse {
        data: Presence {
            universe_id,
            members,
        },
    }))
}

async fn update_group(
    state: &AppState,
    universe_id: DbId,
    user_id: DbId,
    kind: ParameterKind,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<Json<DataResponse<UniverseParameters>>> {
    let parameters = update_parameters(state, universe_id, user_id, kind, json_body(body)?).await?;
    Ok(Json(DataResponse { data: parameters }))
}
