//! Harmonic Universe domain library.
//!
//! Pure logic with no network or database access: shared error and id types,
//! universe parameter validation and access rules, the real-time collaboration
//! wire protocol, and the audio processing toolkit.

pub mod audio;
pub mod collaboration;
pub mod error;
pub mod types;
pub mod universe;
