#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use harmonic_api::auth::jwt::{generate_access_token, JwtConfig};
use harmonic_api::config::ServerConfig;
use harmonic_api::router::build_app_router;
use harmonic_api::state::AppState;
use harmonic_api::ws::WsManager;
use harmonic_core::audio::AudioProcessor;
use harmonic_db::models::universe::CreateUniverse;
use harmonic_db::models::user::CreateUser;
use harmonic_db::repositories::{UniverseRepo, UserRepo};

pub const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";
pub const TEST_ORIGIN: &str = "http://localhost:3000";

/// Build a test `ServerConfig` storing uploads under `upload_folder`.
pub fn test_config(upload_folder: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![TEST_ORIGIN.to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        upload_folder: upload_folder.to_path_buf(),
        max_upload_bytes: 1024 * 1024,
        redis_url: None,
    }
}

pub fn test_state(pool: PgPool, upload_folder: &Path) -> AppState {
    AppState {
        pool,
        config: Arc::new(test_config(upload_folder)),
        ws_manager: Arc::new(WsManager::new()),
        audio: Arc::new(AudioProcessor::default()),
    }
}

/// Full router with the production middleware stack.
pub fn build_test_app(state: AppState) -> Router {
    let config = state.config.clone();
    build_app_router(state, &config)
}

/// Router for tests that never touch uploads.
pub fn build_default_app(pool: PgPool) -> Router {
    build_test_app(test_state(pool, &std::env::temp_dir()))
}

pub fn token_for(user_id: i64) -> String {
    let config = JwtConfig {
        secret: TEST_SECRET.to_string(),
        access_token_expiry_mins: 15,
    };
    generate_access_token(user_id, &config).expect("token generation should succeed")
}

pub fn bearer(user_id: i64) -> String {
    format!("Bearer {}", token_for(user_id))
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn create_test_user(pool: &PgPool, username: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@test.com"),
        },
    )
    .await
    .expect("user creation should succeed")
    .id
}

pub async fn create_test_universe(pool: &PgPool, owner: i64, is_public: bool) -> i64 {
    UniverseRepo::create(
        pool,
        &CreateUniverse {
            user_id: owner,
            name: format!("Universe of {owner}"),
            is_public: Some(is_public),
            ..Default::default()
        },
    )
    .await
    .expect("universe creation should succeed")
    .id
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn get_auth(app: Router, uri: &str, user_id: i64) -> Response {
    let request = Request::get(uri)
        .header("authorization", bearer(user_id))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    user_id: i64,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", bearer(user_id))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Assert an error envelope with the given status and code.
pub async fn assert_error(response: Response, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code, "body: {json}");
    assert!(json["error"].is_string());
}
