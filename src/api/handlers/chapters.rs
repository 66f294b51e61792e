use crate::{
    api::extract::{ApiJson, ApiPath, ApiQuery},
    auth::{AdminUser, AuthUser},
    types::{
        ChapterCompletion, ChapterCreate, ChapterPointPublic, ChapterPublic, ChapterUpdate,
        ChaptersPublic, Message, Pagination, Result, UserCoursePublic,
    },
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChapterPointsParam {
    /// Embed each chapter's points, ordered by point number
    pub include_chapter_points: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/v1/chapters",
    params(Pagination),
    responses(
        (status = 200, description = "Chapters", body = ChaptersPublic),
        (status = 400, description = "Invalid pagination")
    ),
    tag = "chapters"
)]
pub async fn read_chapters(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<ChaptersPublic>> {
    page.validate()?;

    let chapters = state.db.list_chapters(page.skip, page.limit).await?;
    let count = if page.include_count {
        Some(state.db.count_chapters().await?)
    } else {
        None
    };

    Ok(Json(ChaptersPublic {
        data: chapters.iter().map(|c| c.to_public(None)).collect(),
        count,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/chapters/{id}",
    params(("id" = Uuid, Path, description = "Chapter id"), ChapterPointsParam),
    responses(
        (status = 200, description = "Chapter, with its points unless disabled", body = ChapterPublic),
        (status = 404, description = "Chapter not found")
    ),
    tag = "chapters"
)]
pub async fn read_chapter(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(param): ApiQuery<ChapterPointsParam>,
) -> Result<Json<ChapterPublic>> {
    let chapter = state.db.require_chapter(id).await?;

    let points = if param.include_chapter_points.unwrap_or(true) {
        Some(points_of(&state, id).await?)
    } else {
        None
    };

    Ok(Json(chapter.to_public(points)))
}

async fn points_of(state: &AppState, chapter_id: Uuid) -> Result<Vec<ChapterPointPublic>> {
    let points = state.db.chapter_points(chapter_id).await?;
    Ok(points.iter().map(|p| p.to_public()).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/chapters/{id}/chapter-points",
    params(("id" = Uuid, Path, description = "Chapter id")),
    responses(
        (status = 200, description = "Points of the chapter", body = [ChapterPointPublic]),
        (status = 404, description = "Chapter not found")
    ),
    tag = "chapters"
)]
pub async fn read_points_of_chapter(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<ChapterPointPublic>>> {
    state.db.require_chapter(id).await?;
    Ok(Json(points_of(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/chapters",
    request_body = ChapterCreate,
    responses(
        (status = 201, description = "Chapter created", body = ChapterPublic),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Chapter number already used in this course")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
pub async fn create_chapter(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(payload): ApiJson<ChapterCreate>,
) -> Result<(StatusCode, Json<ChapterPublic>)> {
    payload.validate()?;

    let chapter = state.db.create_chapter(&payload).await?;

    tracing::info!(
        admin_id = %admin.id,
        course_id = %chapter.course_id,
        chapter_num = chapter.chapter_num,
        "Chapter created"
    );
    Ok((StatusCode::CREATED, Json(chapter.to_public(Some(Vec::new())))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/chapters/{id}",
    params(("id" = Uuid, Path, description = "Chapter id")),
    request_body = ChapterUpdate,
    responses(
        (status = 200, description = "Chapter updated", body = ChapterPublic),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Chapter not found"),
        (status = 409, description = "Chapter number already used in this course")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
pub async fn update_chapter(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ChapterUpdate>,
) -> Result<Json<ChapterPublic>> {
    payload.validate()?;

    let chapter = state.db.update_chapter(id, &payload).await?;
    let points = points_of(&state, id).await?;
    Ok(Json(chapter.to_public(Some(points))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/chapters/{id}",
    params(("id" = Uuid, Path, description = "Chapter id")),
    responses(
        (status = 200, description = "Chapter deleted", body = Message),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Chapter not found")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
pub async fn delete_chapter(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Message>> {
    state.db.delete_chapter(id).await?;

    tracing::info!(admin_id = %admin.id, chapter_id = %id, "Chapter deleted");
    Ok(Json(Message::new("Chapter deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/chapters/{id}/completed",
    params(("id" = Uuid, Path, description = "Chapter id")),
    responses(
        (status = 200, description = "Whether the current user finished the chapter", body = ChapterCompletion),
        (status = 404, description = "Chapter not found")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
pub async fn read_chapter_completion(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ChapterCompletion>> {
    state.db.require_chapter(id).await?;

    let completed = state.db.is_chapter_finished(user.id, id).await?;
    Ok(Json(ChapterCompletion { completed }))
}

/// Marks the chapter finished and returns the recomputed enrollment.
#[utoipa::path(
    post,
    path = "/api/v1/chapters/{id}/completed",
    params(("id" = Uuid, Path, description = "Chapter id")),
    responses(
        (status = 200, description = "Enrollment with updated progress", body = UserCoursePublic),
        (status = 404, description = "Chapter not found or not enrolled in its course"),
        (status = 409, description = "Chapter already completed")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapters"
)]
pub async fn complete_chapter(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserCoursePublic>> {
    let enrollment = state.db.complete_chapter(user.id, id).await?;
    let finished = state
        .db
        .finished_chapters(user.id, enrollment.course_id)
        .await?;

    tracing::info!(
        user_id = %user.id,
        chapter_id = %id,
        progress = enrollment.progress,
        "Chapter completed"
    );
    Ok(Json(enrollment.to_public(finished)))
}
