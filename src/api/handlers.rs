use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    utils::{resolve_under, validate_file_extension, IMAGE_EXTENSIONS},
    AppState,
};

use super::responses::{ApiResponse, SimilarResponse};

/// Body of `POST /api/similar`
#[derive(Debug, Deserialize)]
pub struct SimilarRequest {
    /// Image path relative to the upload directory
    pub image_path: String,
    /// Query point, image pixels
    pub x: i32,
    /// Query point, image pixels
    pub y: i32,
}

/// Detects objects under the query point and returns similar catalog products
pub async fn find_similar(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimilarRequest>,
) -> Result<impl IntoResponse> {
    if !validate_file_extension(&request.image_path, IMAGE_EXTENSIONS) {
        return Err(AppError::InvalidInput(format!(
            "unsupported image type: {}",
            request.image_path
        )));
    }

    let path = resolve_under(&state.config.upload_dir, &request.image_path)?;
    if !path.is_file() {
        return Err(AppError::NotFound(format!("image {}", request.image_path)));
    }

    log::debug!(
        "Similarity query on {} at ({}, {})",
        path.display(),
        request.x,
        request.y
    );

    // Model loading and inference block
    let outcome = tokio::task::spawn_blocking(move || {
        let matcher = state.matcher()?;
        matcher.search(&path, request.x, request.y)
    })
    .await??;

    Ok(ApiResponse::success(SimilarResponse::from(outcome)))
}
