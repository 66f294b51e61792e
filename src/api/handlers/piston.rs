use crate::{
    api::extract::ApiJson,
    services::{CodeRequest, CodeResponse},
    types::Result,
    AppState,
};
use axum::{extract::State, Json};

/// Runs a submission on Piston and parses any runtime error from stderr.
#[utoipa::path(
    post,
    path = "/api/v1/piston/execute",
    request_body = CodeRequest,
    responses(
        (status = 200, description = "Execution result", body = CodeResponse),
        (status = 400, description = "Invalid request"),
        (status = 429, description = "Too many executions"),
        (status = 502, description = "Piston unavailable"),
        (status = 504, description = "Piston timed out")
    ),
    tag = "piston"
)]
pub async fn execute_code(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CodeRequest>,
) -> Result<Json<CodeResponse>> {
    payload.validate()?;

    let response = state.piston.execute(&payload).await?;
    Ok(Json(response))
}
