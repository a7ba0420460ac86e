//! Story generation endpoint
//!
//! POST /api/game/generate takes `{command, context?, genre?}` and answers
//! `{response}`. Prohibited player language is answered with a content
//! warning without calling the provider; provider output is masked unless it
//! reads as a teaching reply.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::schemas::game::{GenerateRequest, GenerateResponse};
use crate::server::state::AppState;
use crate::services::content_filter::CONTENT_WARNING;
use crate::services::storyteller::GenerationRequest;
use crate::utils::preview;

pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) = payload.map_err(|e| {
        ApiError::failed(e.status(), "Failed to generate response").with_details(e.body_text())
    })?;

    let command = body
        .command
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("Command is required".to_string()))?;

    if state.content_filter.contains_prohibited(&command) {
        tracing::info!("Player command contains prohibited language");
        return Ok(Json(GenerateResponse {
            response: CONTENT_WARNING.to_string(),
        }));
    }

    tracing::info!(
        command = %preview(&command, 100),
        genre = %body.genre.as_deref().unwrap_or("not specified"),
        "Generating story response"
    );

    let request = GenerationRequest {
        command,
        context: body.context,
        genre: body.genre,
    };

    // Dropping the handler (client went away) cancels the turn
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let response = state.storyteller.generate(&request, &cancel).await?;

    Ok(Json(GenerateResponse {
        response: state.content_filter.filter_prohibited(&response),
    }))
}
