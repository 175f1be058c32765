//! Harmonic Universe API server library.
//!
//! Exposes config, state, error handling, routes and the WebSocket
//! collaboration layer so integration tests and the binary entrypoint can
//! both use them.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod parameters;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
