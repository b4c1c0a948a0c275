use std::{path::PathBuf, sync::Arc};

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection}, DefaultBodyLimit, Multipart,
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use image::ImageError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

use crate::{
    inference::{InferenceContext, PredictError},
    upload::TempUpload,
};

pub const IMAGE_FIELD: &str = "image";

pub struct AppState {
    pub inference: InferenceContext,
    pub temp_dir: PathBuf,
}

#[derive(Serialize)]
pub struct PredictionResponse {
    pub prediction: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No image file")]
    MissingImage,
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("failed to store upload: {0}")]
    Upload(std::io::Error),
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error("inference worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Predict(PredictError::Decode(ImageError::Unsupported(_))) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ApiError::Predict(PredictError::Decode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upload(_) | ApiError::Predict(_) | ApiError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("predict failed: {self}");
        } else {
            warn!("predict rejected: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn predict_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    // Bodies that are not multipart at all carry no image either.
    let mut multipart = multipart.map_err(|rejection| {
        debug!("not a multipart body: {rejection}");
        ApiError::MissingImage
    })?;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // Only file parts count; a plain text field named `image` does not.
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let bytes = field.bytes().await?;
        // Browsers send an empty, nameless part when no file was picked.
        if file_name.is_empty() || bytes.is_empty() {
            continue;
        }
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or(ApiError::MissingImage)?;
    debug!(file_name = %file_name, size = bytes.len(), "image received");

    let temp = TempUpload::persist(&state.temp_dir, Some(&file_name), &bytes)
        .await
        .map_err(ApiError::Upload)?;

    let worker_state = state.clone();
    let prediction = tokio::task::spawn_blocking(move || {
        let result = worker_state.inference.predict_path(temp.path());
        drop(temp);
        result
    })
    .await??;

    Ok(Json(PredictionResponse { prediction }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}
