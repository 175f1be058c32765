//! Unit tests for `WsManager`.
//!
//! These exercise connection and room bookkeeping directly, without any HTTP
//! upgrade or database.

use axum::extract::ws::Message;
use harmonic_api::ws::WsManager;
use harmonic_core::collaboration::ServerMessage;
use tokio::sync::mpsc::UnboundedReceiver;

/// Pop the next queued message, which must be a JSON text frame.
fn next_json(rx: &mut UnboundedReceiver<Message>) -> serde_json::Value {
    match rx.try_recv().expect("a message should be queued") {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

fn assert_empty(rx: &mut UnboundedReceiver<Message>) {
    assert!(rx.try_recv().is_err(), "no message should be queued");
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();
    assert_eq!(manager.connection_count().await, 0);

    let _rx = manager.add("conn-1".to_string(), 1).await;
    assert_eq!(manager.connection_count().await, 1);
    assert_eq!(manager.user_of("conn-1").await, Some(1));

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn remove_unknown_id_is_noop() {
    let manager = WsManager::new();
    let _rx = manager.add("conn-1".to_string(), 1).await;

    assert!(manager.remove("nonexistent").await.is_empty());
    assert_eq!(manager.connection_count().await, 1);
}

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".to_string(), 1).await;
    let mut rx2 = manager.add("conn-2".to_string(), 2).await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);
    assert!(matches!(rx1.recv().await, Some(Message::Close(None))));
    assert!(matches!(rx2.recv().await, Some(Message::Close(None))));
    assert!(rx1.recv().await.is_none(), "channel should close after shutdown");
}

#[tokio::test]
async fn ping_all_sends_ping_frames() {
    let manager = WsManager::new();
    let mut rx = manager.add("conn-1".to_string(), 1).await;

    manager.ping_all().await;

    assert!(matches!(rx.recv().await, Some(Message::Ping(_))));
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_notifies_existing_members_only() {
    let manager = WsManager::new();
    let mut alice = manager.add("a".to_string(), 1).await;
    let mut bob = manager.add("b".to_string(), 2).await;

    let first = manager.join_room("a", 10).await.unwrap();
    assert!(!first.already_joined);
    assert_eq!(first.members.len(), 1);
    assert_empty(&mut alice);

    let second = manager.join_room("b", 10).await.unwrap();
    assert_eq!(
        second.members.iter().map(|m| m.user_id).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let joined = next_json(&mut alice);
    assert_eq!(joined["type"], "user_joined");
    assert_eq!(joined["universe_id"], 10);
    assert_eq!(joined["user_id"], 2);
    assert_empty(&mut bob);
}

#[tokio::test]
async fn rejoin_is_idempotent() {
    let manager = WsManager::new();
    let mut alice = manager.add("a".to_string(), 1).await;
    let _bob = manager.add("b".to_string(), 2).await;

    manager.join_room("a", 10).await.unwrap();
    manager.join_room("b", 10).await.unwrap();
    let _ = next_json(&mut alice);

    let again = manager.join_room("b", 10).await.unwrap();
    assert!(again.already_joined);
    assert_eq!(again.members.len(), 2);
    assert_empty(&mut alice);
}

#[tokio::test]
async fn join_unknown_connection_returns_none() {
    let manager = WsManager::new();
    assert!(manager.join_room("ghost", 10).await.is_none());
}

#[tokio::test]
async fn leave_notifies_remaining_members() {
    let manager = WsManager::new();
    let mut alice = manager.add("a".to_string(), 1).await;
    let mut bob = manager.add("b".to_string(), 2).await;
    manager.join_room("a", 10).await.unwrap();
    manager.join_room("b", 10).await.unwrap();
    let _ = next_json(&mut alice);

    assert!(manager.leave_room("b", 10).await);
    assert!(!manager.is_in_room("b", 10).await);

    let left = next_json(&mut alice);
    assert_eq!(left["type"], "user_left");
    assert_eq!(left["user_id"], 2);
    assert_empty(&mut bob);

    assert!(!manager.leave_room("b", 10).await, "second leave is refused");
}

#[tokio::test]
async fn second_connection_of_same_user_does_not_duplicate_presence() {
    let manager = WsManager::new();
    let mut alice = manager.add("a".to_string(), 1).await;
    let _bob_tab1 = manager.add("b1".to_string(), 2).await;
    let _bob_tab2 = manager.add("b2".to_string(), 2).await;

    manager.join_room("a", 10).await.unwrap();
    manager.join_room("b1", 10).await.unwrap();
    assert_eq!(next_json(&mut alice)["type"], "user_joined");

    let outcome = manager.join_room("b2", 10).await.unwrap();
    assert_eq!(outcome.members.len(), 2, "one entry per user");
    assert_empty(&mut alice);

    // Bob is still present through b2.
    manager.leave_room("b1", 10).await;
    assert_empty(&mut alice);

    manager.remove("b2").await;
    assert_eq!(next_json(&mut alice)["type"], "user_left");
}

#[tokio::test]
async fn remove_leaves_every_room() {
    let manager = WsManager::new();
    let mut alice = manager.add("a".to_string(), 1).await;
    let _bob = manager.add("b".to_string(), 2).await;
    for room in [10, 11] {
        manager.join_room("a", room).await.unwrap();
        manager.join_room("b", room).await.unwrap();
        let _ = next_json(&mut alice);
    }

    let mut rooms = manager.remove("b").await;
    rooms.sort_unstable();
    assert_eq!(rooms, vec![10, 11]);

    let mut notified: Vec<i64> = (0..2)
        .map(|_| next_json(&mut alice)["universe_id"].as_i64().unwrap())
        .collect();
    notified.sort_unstable();
    assert_eq!(notified, vec![10, 11]);
    assert!(manager.room_members(10).await.iter().all(|m| m.user_id == 1));
}

#[tokio::test]
async fn broadcast_to_room_respects_membership_and_exclusion() {
    let manager = WsManager::new();
    let mut alice = manager.add("a".to_string(), 1).await;
    let mut bob = manager.add("b".to_string(), 2).await;
    let mut carol = manager.add("c".to_string(), 3).await;
    manager.join_room("a", 10).await.unwrap();
    manager.join_room("b", 10).await.unwrap();
    let _ = next_json(&mut alice);

    let message = ServerMessage::HeartbeatResponse {
        timestamp: "now".to_string(),
    };
    assert_eq!(manager.broadcast_to_room(10, &message, None).await, 2);
    assert_eq!(next_json(&mut alice)["type"], "heartbeat_response");
    assert_eq!(next_json(&mut bob)["type"], "heartbeat_response");
    assert_empty(&mut carol);

    assert_eq!(manager.broadcast_to_room(10, &message, Some("a")).await, 1);
    assert_empty(&mut alice);
    assert_eq!(next_json(&mut bob)["type"], "heartbeat_response");
}

#[tokio::test]
async fn broadcast_skips_closed_channels() {
    let manager = WsManager::new();
    let mut alice = manager.add("a".to_string(), 1).await;
    let bob = manager.add("b".to_string(), 2).await;
    manager.join_room("a", 10).await.unwrap();
    manager.join_room("b", 10).await.unwrap();
    let _ = next_json(&mut alice);
    drop(bob);

    let message = ServerMessage::error("X", "y");
    assert_eq!(manager.broadcast_to_room(10, &message, None).await, 1);
    assert!(!manager.send_to("b", &message).await);
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prune_stale_closes_and_notifies() {
    let manager = WsManager::new();
    let mut alice = manager.add("a".to_string(), 1).await;
    let mut bob = manager.add("b".to_string(), 2).await;
    manager.join_room("a", 10).await.unwrap();
    manager.join_room("b", 10).await.unwrap();
    let _ = next_json(&mut alice);

    // Everything registered so far is older than this cutoff.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let cutoff = chrono::Utc::now();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    manager.touch("a").await;

    let pruned = manager.prune_stale(cutoff).await;
    assert_eq!(pruned, vec!["b".to_string()]);
    assert_eq!(manager.connection_count().await, 1);

    assert!(matches!(bob.try_recv(), Ok(Message::Close(None))));
    let left = next_json(&mut alice);
    assert_eq!(left["type"], "user_left");
    assert_eq!(left["user_id"], 2);
}

#[tokio::test]
async fn heartbeat_tick_pings_live_connections() {
    let manager = WsManager::new();
    let mut rx = manager.add("a".to_string(), 1).await;

    harmonic_api::ws::heartbeat_tick(&manager).await;

    assert_eq!(manager.connection_count().await, 1);
    assert!(matches!(rx.try_recv(), Ok(Message::Ping(_))));
}
