//! Route handlers.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use cadence_inference::{AudioFormat, PredictionResult, RawAudioBlob};
use serde::Serialize;
use tracing::debug;

use crate::errors::ApiError;
use crate::health::{HealthResponse, health_check};
use crate::server::AppState;

/// Multipart field that carries the upload.
pub const FILE_FIELD: &str = "file";

/// `POST /predict`
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let mut multipart = multipart?;
    let blob = read_upload(&mut multipart).await?;
    let result = state.predictor.predict(blob).await?;
    Ok(Json(result))
}

/// Pull the first `file` field, or the first field with a filename.
async fn read_upload(multipart: &mut Multipart) -> Result<RawAudioBlob, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) && field.file_name().is_none() {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let mime = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(ApiError::InvalidRequest("uploaded file is empty".into()));
        }

        let format = AudioFormat::infer(filename.as_deref(), mime.as_deref());
        debug!(
            filename = filename.as_deref().unwrap_or(""),
            mime = mime.as_deref().unwrap_or(""),
            bytes = data.len(),
            "upload received"
        );
        return Ok(RawAudioBlob::new(data, format));
    }
    Err(ApiError::InvalidRequest(format!(
        "no `{FILE_FIELD}` field in multipart body"
    )))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_check(state.start_time, &state.registry))
}

/// `GET /genres` response body.
#[derive(Debug, Clone, Serialize)]
pub struct GenresResponse {
    /// Configured labels in classifier output order.
    pub genres: Vec<String>,
}

/// `GET /genres`
pub async fn genres(State(state): State<AppState>) -> Json<GenresResponse> {
    Json(GenresResponse {
        genres: state.settings.inference.genres.clone(),
    })
}
