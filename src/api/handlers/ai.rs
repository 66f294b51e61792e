use crate::{
    api::extract::ApiJson,
    services::{HintRequest, HintResponse},
    types::Result,
    AppState,
};
use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct AiHealth {
    pub status: String,
    pub service: String,
    pub model: String,
}

/// Generates a tutoring hint for the learner's code.
#[utoipa::path(
    post,
    path = "/api/v1/ai/generate",
    request_body = HintRequest,
    responses(
        (status = 200, description = "Generated hint", body = HintResponse),
        (status = 400, description = "Invalid request"),
        (status = 429, description = "Daily hint budget exhausted"),
        (status = 502, description = "AI provider unavailable or replied with garbage"),
        (status = 504, description = "AI provider timed out")
    ),
    tag = "ai"
)]
pub async fn generate_hint(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<HintRequest>,
) -> Result<Json<HintResponse>> {
    let hint = state.hints.generate(&payload).await?;
    Ok(Json(hint))
}

#[utoipa::path(
    get,
    path = "/api/v1/ai/health",
    responses((status = 200, description = "Hint service is configured", body = AiHealth)),
    tag = "ai"
)]
pub async fn ai_health(State(state): State<AppState>) -> Json<AiHealth> {
    Json(AiHealth {
        status: "healthy".to_string(),
        service: "hints".to_string(),
        model: state.hints.model_name().to_string(),
    })
}
