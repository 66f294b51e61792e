use crate::{
    api::extract::{ApiJson, ApiPath, ApiQuery},
    auth::AdminUser,
    types::{
        ChapterPointCreate, ChapterPointPublic, ChapterPointUpdate, ChapterPointsPublic, Message,
        Pagination, Result,
    },
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/v1/chapter-points",
    params(Pagination),
    responses(
        (status = 200, description = "Chapter points", body = ChapterPointsPublic),
        (status = 400, description = "Invalid pagination")
    ),
    tag = "chapter-points"
)]
pub async fn read_chapter_points(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<ChapterPointsPublic>> {
    page.validate()?;

    let points = state.db.list_chapter_points(page.skip, page.limit).await?;
    let count = if page.include_count {
        Some(state.db.count_chapter_points().await?)
    } else {
        None
    };

    Ok(Json(ChapterPointsPublic {
        data: points.iter().map(|p| p.to_public()).collect(),
        count,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/chapter-points/{id}",
    params(("id" = Uuid, Path, description = "Chapter point id")),
    responses(
        (status = 200, description = "Chapter point", body = ChapterPointPublic),
        (status = 404, description = "Chapter point not found")
    ),
    tag = "chapter-points"
)]
pub async fn read_chapter_point(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ChapterPointPublic>> {
    let point = state.db.require_chapter_point(id).await?;
    Ok(Json(point.to_public()))
}

#[utoipa::path(
    post,
    path = "/api/v1/chapter-points",
    request_body = ChapterPointCreate,
    responses(
        (status = 201, description = "Chapter point created", body = ChapterPointPublic),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Chapter not found"),
        (status = 409, description = "Point number already used in this chapter")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapter-points"
)]
pub async fn create_chapter_point(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(payload): ApiJson<ChapterPointCreate>,
) -> Result<(StatusCode, Json<ChapterPointPublic>)> {
    payload.validate()?;

    let point = state.db.create_chapter_point(&payload).await?;

    tracing::info!(
        admin_id = %admin.id,
        chapter_id = %point.chapter_id,
        point_num = point.point_num,
        "Chapter point created"
    );
    Ok((StatusCode::CREATED, Json(point.to_public())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/chapter-points/{id}",
    params(("id" = Uuid, Path, description = "Chapter point id")),
    request_body = ChapterPointUpdate,
    responses(
        (status = 200, description = "Chapter point updated", body = ChapterPointPublic),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Chapter point not found"),
        (status = 409, description = "Point number already used in this chapter")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapter-points"
)]
pub async fn update_chapter_point(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ChapterPointUpdate>,
) -> Result<Json<ChapterPointPublic>> {
    payload.validate()?;

    let point = state.db.update_chapter_point(id, &payload).await?;
    Ok(Json(point.to_public()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/chapter-points/{id}",
    params(("id" = Uuid, Path, description = "Chapter point id")),
    responses(
        (status = 200, description = "Chapter point deleted", body = Message),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Chapter point not found")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "chapter-points"
)]
pub async fn delete_chapter_point(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Message>> {
    state.db.delete_chapter_point(id).await?;

    tracing::info!(admin_id = %admin.id, point_id = %id, "Chapter point deleted");
    Ok(Json(Message::new("Chapter point deleted successfully")))
}
