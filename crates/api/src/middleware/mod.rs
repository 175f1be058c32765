//! Request extractors.
//!
//! - [`auth::AuthUser`] -- user from a JWT Bearer token.
//! - [`auth::WsAuthUser`] -- same, but also accepts a `?token=` query parameter.

pub mod auth;
