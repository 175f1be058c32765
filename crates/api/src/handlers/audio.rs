//! Handlers for audio uploads, analysis and effect processing.
//!
//! Files live at `UPLOAD_FOLDER/<user_id>/<file_id>.wav`, so a user can only
//! ever address their own files. `file_id` must be a UUID, which also keeps
//! path segments out of the lookup. All DSP runs on the blocking pool.

use std::io::Cursor;
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use harmonic_core::audio::{decode_wav, load_wav, save_wav, AudioAnalysis, Effect};
use harmonic_core::error::CoreError;
use harmonic_core::types::DbId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::json_body;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Extensions accepted on upload.
const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &["wav"];

/// A stored audio file and its analysis.
#[derive(Debug, Serialize)]
pub struct AudioFile {
    pub file_id: Uuid,
    /// Name supplied by the client (uploads) or the file the effects were applied to.
    pub source: String,
    pub analysis: AudioAnalysis,
}

/// Body of `POST /api/audio/uploads/{file_id}/effects`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectsRequest {
    pub effects: Vec<Effect>,
    /// Target peak for normalisation after the chain, in `(0, 1]`.
    #[serde(default)]
    pub normalize: Option<f32>,
}

/// POST /api/audio/uploads
///
/// Accepts a multipart form with a required `file` field holding a WAV file.
/// The file is decoded and analysed before it is stored; undecodable input
/// is rejected with 400.
pub async fn upload_audio(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<AudioFile>>)> {
    let mut file_data: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload.wav").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            file_data = Some((filename, data.to_vec()));
        }
    }

    let (filename, data) =
        file_data.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;

    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unsupported audio format '{filename}'. Supported: .wav"
        )));
    }
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }

    let processor = state.audio.clone();
    let (data, analysis) = run_blocking(move || {
        let buffer = decode_wav(Cursor::new(&data))?;
        let analysis = processor.analyze(&buffer)?;
        Ok((data, analysis))
    })
    .await?;

    let file_id = Uuid::new_v4();
    let path = file_path(&state, auth.user_id, file_id);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;
    }
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    tracing::info!(
        user_id = auth.user_id,
        file_id = %file_id,
        bytes = data.len(),
        duration_secs = analysis.frequency.duration_secs,
        "Audio uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: AudioFile {
                file_id,
                source: filename,
                analysis,
            },
        }),
    ))
}

/// GET /api/audio/uploads/{file_id}
pub async fn download_audio(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Response> {
    let file_id = parse_file_id(&file_id)?;
    let path = existing_file(&state, auth.user_id, file_id).await?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_id}.wav\""),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

/// GET /api/audio/uploads/{file_id}/analysis
pub async fn analyze_audio(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Json<DataResponse<AudioFile>>> {
    let file_id = parse_file_id(&file_id)?;
    let path = existing_file(&state, auth.user_id, file_id).await?;

    let processor = state.audio.clone();
    let analysis = run_blocking(move || Ok(processor.analyze(&load_wav(&path)?)?)).await?;

    Ok(Json(DataResponse {
        data: AudioFile {
            file_id,
            source: format!("{file_id}.wav"),
            analysis,
        },
    }))
}

/// POST /api/audio/uploads/{file_id}/effects
///
/// Applies the effect chain to a stored file and writes the result as a new
/// file; the source is left untouched.
pub async fn apply_effects(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    body: Result<Json<EffectsRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<AudioFile>>)> {
    let source_id = parse_file_id(&file_id)?;
    let request = json_body(body)?;
    let source_path = existing_file(&state, auth.user_id, source_id).await?;

    let output_id = Uuid::new_v4();
    let output_path = file_path(&state, auth.user_id, output_id);
    let chain: Vec<&'static str> = request.effects.iter().map(Effect::name).collect();

    let processor = state.audio.clone();
    let analysis = run_blocking(move || {
        let input = load_wav(&source_path)?;
        let output = processor.process(&input, &request.effects, request.normalize)?;
        let analysis = processor.analyze(&output)?;
        save_wav(&output_path, &output)?;
        Ok(analysis)
    })
    .await?;

    tracing::info!(
        user_id = auth.user_id,
        source_id = %source_id,
        output_id = %output_id,
        effects = ?chain,
        "Effects applied"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: AudioFile {
                file_id: output_id,
                source: format!("{source_id}.wav"),
                analysis,
            },
        }),
    ))
}

fn parse_file_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid file id '{raw}'")))
}

fn file_path(state: &AppState, user_id: DbId, file_id: Uuid) -> PathBuf {
    state
        .config
        .upload_folder
        .join(user_id.to_string())
        .join(format!("{file_id}.wav"))
}

async fn existing_file(state: &AppState, user_id: DbId, file_id: Uuid) -> AppResult<PathBuf> {
    let path = file_path(state, user_id, file_id);
    match tokio::fs::try_exists(&path).await {
        Ok(true) => Ok(path),
        Ok(false) => Err(AppError::NotFound(format!("Audio file {file_id} not found"))),
        Err(e) => Err(AppError::InternalError(e.to_string())),
    }
}

/// Run CPU-bound audio work on the blocking pool.
async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::InternalError(format!("Audio task failed: {e}")))?
        .map_err(AppError::from)
}
