use std::sync::Arc;
use std::time::Duration;

use harmonic_core::collaboration::{HEARTBEAT_INTERVAL_SECS, HEARTBEAT_TIMEOUT_SECS};
use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// Spawn a background task that prunes silent connections and pings the rest.
///
/// Every [`HEARTBEAT_INTERVAL_SECS`] the task closes connections with no
/// inbound traffic for [`HEARTBEAT_TIMEOUT_SECS`], then sends a Ping frame to
/// every remaining client. The Pong replies keep healthy connections alive.
/// Runs until `cancel` fires.
pub fn start_heartbeat(
    ws_manager: Arc<WsManager>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Heartbeat task cancelled");
                    break;
                }
                _ = interval.tick() => {
                    heartbeat_tick(&ws_manager).await;
                }
            }
        }
    })
}

/// One heartbeat round: prune, then ping.
pub async fn heartbeat_tick(ws_manager: &WsManager) {
    let cutoff = chrono::Utc::now() - chrono::Duration::seconds(HEARTBEAT_TIMEOUT_SECS);
    let pruned = ws_manager.prune_stale(cutoff).await;
    let count = ws_manager.connection_count().await;
    tracing::debug!(count, pruned = pruned.len(), "WebSocket heartbeat ping");
    ws_manager.ping_all().await;
}
