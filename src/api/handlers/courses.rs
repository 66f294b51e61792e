use super::chapters::ChapterPointsParam;
use crate::{
    api::extract::{ApiJson, ApiPath, ApiQuery},
    auth::AdminUser,
    db::Course,
    types::{
        ChapterPublic, ChaptersPublic, CourseCreate, CoursePublic, CourseUpdate, CoursesPublic,
        Message, Pagination, Result,
    },
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::collections::HashMap;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChaptersParam {
    /// Embed the course's chapters, ordered by chapter number
    pub include_chapters: Option<bool>,
    /// Also embed each chapter's points
    pub include_chapter_points: Option<bool>,
}

async fn with_chapters(
    state: &AppState,
    course: &Course,
    include_points: bool,
) -> Result<Vec<ChapterPublic>> {
    let chapters = state.db.course_chapters(course.id).await?;
    let mut points = if include_points {
        state.db.course_chapter_points(course.id).await?
    } else {
        HashMap::new()
    };

    Ok(chapters
        .iter()
        .map(|chapter| {
            let embedded = include_points.then(|| {
                points
                    .remove(&chapter.id)
                    .unwrap_or_default()
                    .iter()
                    .map(|p| p.to_public())
                    .collect()
            });
            chapter.to_public(embedded)
        })
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/courses",
    params(Pagination, ChaptersParam),
    responses(
        (status = 200, description = "Courses", body = CoursesPublic),
        (status = 400, description = "Invalid pagination")
    ),
    tag = "courses"
)]
pub async fn read_courses(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
    ApiQuery(param): ApiQuery<ChaptersParam>,
) -> Result<Json<CoursesPublic>> {
    page.validate()?;

    let courses = state.db.list_courses(page.skip, page.limit).await?;
    let include_chapters = param.include_chapters.unwrap_or(false);
    let include_points = param.include_chapter_points.unwrap_or(false);

    let mut data = Vec::with_capacity(courses.len());
    for course in &courses {
        let chapters = if include_chapters {
            Some(with_chapters(&state, course, include_points).await?)
        } else {
            None
        };
        data.push(course.to_public(chapters));
    }

    let count = if page.include_count {
        Some(state.db.count_courses().await?)
    } else {
        None
    };

    Ok(Json(CoursesPublic { data, count }))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id"), ChaptersParam),
    responses(
        (status = 200, description = "Course, with chapters unless disabled", body = CoursePublic),
        (status = 404, description = "Course not found")
    ),
    tag = "courses"
)]
pub async fn read_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(param): ApiQuery<ChaptersParam>,
) -> Result<Json<CoursePublic>> {
    let course = state.db.require_course(id).await?;

    let chapters = if param.include_chapters.unwrap_or(true) {
        let include_points = param.include_chapter_points.unwrap_or(false);
        Some(with_chapters(&state, &course, include_points).await?)
    } else {
        None
    };

    Ok(Json(course.to_public(chapters)))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/chapters",
    params(("id" = Uuid, Path, description = "Course id"), ChapterPointsParam),
    responses(
        (status = 200, description = "Chapters of the course", body = ChaptersPublic),
        (status = 404, description = "Course not found")
    ),
    tag = "courses"
)]
pub async fn read_course_chapters(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(param): ApiQuery<ChapterPointsParam>,
) -> Result<Json<ChaptersPublic>> {
    let course = state.db.require_course(id).await?;
    let include_points = param.include_chapter_points.unwrap_or(false);
    let data = with_chapters(&state, &course, include_points).await?;

    Ok(Json(ChaptersPublic {
        count: Some(data.len() as u64),
        data,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses",
    request_body = CourseCreate,
    responses(
        (status = 201, description = "Course created", body = CoursePublic),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "courses"
)]
pub async fn create_course(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(payload): ApiJson<CourseCreate>,
) -> Result<(StatusCode, Json<CoursePublic>)> {
    payload.validate()?;

    let course = state.db.create_course(&payload).await?;

    tracing::info!(admin_id = %admin.id, course_id = %course.id, "Course created");
    Ok((StatusCode::CREATED, Json(course.to_public(Some(Vec::new())))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = CourseUpdate,
    responses(
        (status = 200, description = "Course updated", body = CoursePublic),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "courses"
)]
pub async fn update_course(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CourseUpdate>,
) -> Result<Json<CoursePublic>> {
    payload.validate()?;

    let course = state.db.update_course(id, &payload).await?;
    let chapters = with_chapters(&state, &course, false).await?;

    Ok(Json(course.to_public(Some(chapters))))
}

/// Deletes a course with its chapters, enrollments and completion records.
#[utoipa::path(
    delete,
    path = "/api/v1/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course deleted", body = Message),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "courses"
)]
pub async fn delete_course(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Message>> {
    state.db.delete_course(id).await?;

    tracing::info!(admin_id = %admin.id, course_id = %id, "Course deleted");
    Ok(Json(Message::new("Course deleted successfully")))
}
