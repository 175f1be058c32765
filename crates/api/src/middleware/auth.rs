//! JWT-based authentication extractors for Axum handlers.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Uri};
use harmonic_core::error::CoreError;
use harmonic_core::types::DbId;
use serde::Deserialize;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the `Authorization` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        authenticate(token, state)
    }
}

/// Authenticated user for the WebSocket upgrade.
///
/// Browsers cannot set headers on a WebSocket handshake, so the token may
/// come from the `token` query parameter; the `Authorization` header is used
/// when the parameter is absent. Must precede `WebSocketUpgrade` in the
/// handler's argument list so a bad token is rejected with 401 before the
/// upgrade is considered.
#[derive(Debug, Clone)]
pub struct WsAuthUser {
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for WsAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = match query_token(&parts.uri) {
            Some(token) => authenticate(&token, state)?,
            None => authenticate(bearer_token(&parts.headers)?, state)?,
        };
        Ok(WsAuthUser {
            user_id: user.user_id,
        })
    }
}

fn authenticate(token: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let claims = validate_token(token, &state.config.jwt).map_err(|_| {
        AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
    })?;
    Ok(AuthUser {
        user_id: claims.sub,
    })
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    })
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Value of the `token` query parameter, if present and non-empty.
fn query_token(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()?
        .0
        .token
        .filter(|value| !value.is_empty())
}
