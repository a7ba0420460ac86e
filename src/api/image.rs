//! Image generation endpoint
//!
//! POST /api/image takes `{prompt, width?, height?}` and answers
//! `{image, seed}` once Stable Horde has finished the job.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::error::ApiError;
use crate::schemas::game::{ImageGenerateRequest, ImageGenerateResponse};
use crate::server::state::AppState;
use crate::services::image::{ImageError, ImageRequest};

pub async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageGenerateRequest>, JsonRejection>,
) -> Result<Json<ImageGenerateResponse>, ApiError> {
    let Json(body) = payload
        .map_err(|e| ApiError::failed(e.status(), "Server error").with_details(e.body_text()))?;

    let prompt = body.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return Err(ImageError::EmptyPrompt.into());
    }

    let image = state
        .images
        .generate(&ImageRequest {
            prompt,
            width: body.width,
            height: body.height,
        })
        .await?;

    Ok(Json(ImageGenerateResponse {
        image: image.image,
        seed: image.seed,
    }))
}
