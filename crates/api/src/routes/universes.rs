use axum::routing::{get, put};
use axum::Router;

use crate::handlers::universe;
use crate::state::AppState;

/// Universe parameter and presence routes, nested under `/universes`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/parameters", get(universe::get_parameters))
        .route("/{id}/physics", put(universe::update_physics))
        .route("/{id}/harmony", put(universe::update_harmony))
        .route("/{id}/presence", get(universe::get_presence))
}
