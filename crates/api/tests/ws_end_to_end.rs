//! End-to-end WebSocket tests against a served router.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use harmonic_core::collaboration::ServerMessage;
use serde_json::json;
use sqlx::PgPool;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn serve(pool: PgPool) -> SocketAddr {
    let app = common::build_default_app(pool);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, user_id: i64) -> Client {
    let url = format!("ws://{addr}/api/ws?token={}", common::token_for(user_id));
    let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

async fn send(client: &mut Client, message: serde_json::Value) {
    client.send(Message::Text(message.to_string())).await.unwrap();
}

/// Next protocol message, skipping control frames.
async fn recv(client: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .unwrap();
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn collaborators_share_parameter_updates(pool: PgPool) {
    let owner = common::create_test_user(&pool, "owner").await;
    let guest = common::create_test_user(&pool, "guest").await;
    let universe = common::create_test_universe(&pool, owner, true).await;
    let addr = serve(pool).await;

    let mut alice = connect(addr, owner).await;
    let mut bob = connect(addr, guest).await;

    send(&mut alice, json!({ "type": "join", "universe_id": universe })).await;
    assert_matches!(recv(&mut alice).await, ServerMessage::JoinResponse { .. });

    send(&mut bob, json!({ "type": "join", "universe_id": universe })).await;
    match recv(&mut bob).await {
        ServerMessage::JoinResponse { members, .. } => assert_eq!(members.len(), 2),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        recv(&mut alice).await,
        ServerMessage::UserJoined {
            universe_id: universe,
            user_id: guest,
        }
    );

    send(
        &mut alice,
        json!({
            "type": "parameter_update",
            "universe_id": universe,
            "kind": "physics",
            "parameters": { "gravity": 3.71 }
        }),
    )
    .await;

    for client in [&mut alice, &mut bob] {
        match recv(client).await {
            ServerMessage::ParametersUpdated {
                parameters,
                updated_by,
                ..
            } => {
                assert_eq!(updated_by, owner);
                assert_eq!(parameters["gravity"], 3.71);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    bob.close(None).await.unwrap();
    assert_eq!(
        recv(&mut alice).await,
        ServerMessage::UserLeft {
            universe_id: universe,
            user_id: guest,
        }
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn heartbeat_round_trip(pool: PgPool) {
    let user = common::create_test_user(&pool, "pulse").await;
    let addr = serve(pool).await;
    let mut client = connect(addr, user).await;

    send(&mut client, json!({ "type": "heartbeat" })).await;
    assert_matches!(recv(&mut client).await, ServerMessage::HeartbeatResponse { .. });
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn handshake_without_token_is_rejected(pool: PgPool) {
    let addr = serve(pool).await;

    let result = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws")).await;
    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), tungstenite::http::StatusCode::UNAUTHORIZED);
        }
        Err(e) => panic!("expected HTTP 401, got {e}"),
        Ok(_) => panic!("handshake should have been refused"),
    }

    let result =
        tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws?token=not-a-jwt")).await;
    assert_matches!(result.map(|_| ()), Err(tungstenite::Error::Http(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn binary_frame_gets_error_and_socket_stays_open(pool: PgPool) {
    let owner = common::create_test_user(&pool, "owner").await;
    let universe = common::create_test_universe(&pool, owner, false).await;
    let addr = serve(pool).await;
    let mut client = connect(addr, owner).await;

    send(&mut client, json!({ "type": "join", "universe_id": universe })).await;
    assert_matches!(recv(&mut client).await, ServerMessage::JoinResponse { .. });

    client
        .send(Message::Binary(br#"{"type":"heartbeat"}"#.to_vec()))
        .await
        .unwrap();
    match recv(&mut client).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "BAD_MESSAGE"),
        other => panic!("unexpected {other:?}"),
    }

    send(&mut client, json!({ "type": "heartbeat" })).await;
    assert_matches!(recv(&mut client).await, ServerMessage::HeartbeatResponse { .. });
}
