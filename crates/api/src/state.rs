use std::sync::Arc;

use harmonic_core::audio::AudioProcessor;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind an `Arc` or is already a handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: harmonic_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connections and universe rooms.
    pub ws_manager: Arc<WsManager>,
    /// Configured analysis and effects pipeline.
    pub audio: Arc<AudioProcessor>,
}
