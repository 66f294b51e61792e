use crate::{
    types::{Result, Stats},
    AppState,
};
use axum::{extract::State, Json};

#[utoipa::path(
    get,
    path = "/api/v1/stats",
    responses((status = 200, description = "Platform totals", body = Stats)),
    tag = "stats"
)]
pub async fn read_stats(State(state): State<AppState>) -> Result<Json<Stats>> {
    let (total_users, total_courses) =
        tokio::try_join!(state.db.count_users(), state.db.count_courses())?;

    Ok(Json(Stats {
        total_users,
        total_courses,
    }))
}
