use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::audio;
use crate::state::AppState;

/// Audio upload and processing routes, nested under `/audio`.
///
/// Uploads get their own body limit; the rest keep axum's default.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/uploads",
            post(audio::upload_audio).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/uploads/{file_id}", get(audio::download_audio))
        .route("/uploads/{file_id}/analysis", get(audio::analyze_audio))
        .route("/uploads/{file_id}/effects", post(audio::apply_effects))
}
