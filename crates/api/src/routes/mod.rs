pub mod audio;
pub mod health;
pub mod universes;

use axum::routing::get;
use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::ws;

/// Build the `/api` route tree.
///
/// ```text
/// /ws                                   WebSocket (token via ?token= or Bearer)
///
/// /universes/{id}/parameters            physics + harmony (GET)
/// /universes/{id}/physics               patch physics (PUT)
/// /universes/{id}/harmony               patch harmony (PUT)
/// /universes/{id}/presence              room members (GET)
///
/// /audio/uploads                        upload WAV (POST, multipart)
/// /audio/uploads/{file_id}              download (GET)
/// /audio/uploads/{file_id}/analysis     analyse (GET)
/// /audio/uploads/{file_id}/effects      apply effect chain (POST)
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/universes", universes::router())
        .nest("/audio", audio::router(config.max_upload_bytes))
}
