//! Authentication primitives.
//!
//! Tokens are issued by another service; this server only verifies them.

pub mod jwt;
