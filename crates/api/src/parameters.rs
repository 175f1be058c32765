//! Universe lookups and parameter writes shared by the REST handlers and the
//! WebSocket dispatcher, so both paths enforce the same rules and broadcast
//! the same `parameters_updated` message.

use harmonic_core::collaboration::ServerMessage;
use harmonic_core::error::CoreError;
use harmonic_core::types::DbId;
use harmonic_core::universe::{
    ensure_can_edit, ensure_can_view, ParameterKind, ParameterPatch, UniverseParameters,
};
use harmonic_db::models::universe::Universe;
use harmonic_db::repositories::UniverseRepo;

use crate::error::AppResult;
use crate::state::AppState;

/// Load a universe the user may view: 404 if missing, 403 if private to
/// someone else.
pub async fn load_viewable(state: &AppState, universe_id: DbId, user_id: DbId) -> AppResult<Universe> {
    let universe = find_universe(state, universe_id).await?;
    ensure_can_view(universe.id, universe.user_id, universe.is_public, user_id)?;
    Ok(universe)
}

/// Decode `raw` as a `kind` patch, merge it over the stored parameters,
/// persist the result and broadcast `parameters_updated` to everyone in the
/// universe's room.
///
/// Checks run in order: the universe exists (404), the caller owns it
/// (403), the patch decodes and the merged group is valid (400). Nothing is
/// written unless all pass. Concurrent writers are not serialized; the last
/// write wins.
pub async fn update_parameters(
    state: &AppState,
    universe_id: DbId,
    user_id: DbId,
    kind: ParameterKind,
    raw: serde_json::Value,
) -> AppResult<UniverseParameters> {
    let universe = find_universe(state, universe_id).await?;
    ensure_can_edit(universe.id, universe.user_id, user_id)?;

    let patch = ParameterPatch::from_json(kind, raw)?;
    let merged = universe.parameters().apply(&patch)?;

    let saved = match patch {
        ParameterPatch::Physics(_) => {
            UniverseRepo::update_physics(&state.pool, universe_id, &merged.physics).await?
        }
        ParameterPatch::Harmony(_) => {
            UniverseRepo::update_harmony(&state.pool, universe_id, &merged.harmony).await?
        }
    };
    let parameters = saved
        .ok_or(CoreError::NotFound {
            entity: "Universe",
            id: universe_id,
        })?
        .parameters();

    let message = ServerMessage::ParametersUpdated {
        universe_id,
        kind,
        parameters: parameters.group_json(kind),
        updated_by: user_id,
    };
    let recipients = state
        .ws_manager
        .broadcast_to_room(universe_id, &message, None)
        .await;

    tracing::info!(
        universe_id,
        user_id,
        kind = kind.as_str(),
        recipients,
        "Universe parameters updated"
    );

    Ok(parameters)
}

async fn find_universe(state: &AppState, universe_id: DbId) -> AppResult<Universe> {
    let universe = UniverseRepo::find_by_id(&state.pool, universe_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Universe",
            id: universe_id,
        })?;
    Ok(universe)
}
