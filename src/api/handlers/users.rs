use crate::{
    api::extract::{ApiJson, ApiPath, ApiQuery},
    auth::{AdminUser, AuthUser},
    db::{Enrollment, NewUser, UserChanges},
    types::{
        AppError, Message, Pagination, Result, Role, UpdatePassword, UserCoursePublic,
        UserCourseUpdate, UserCreate, UserPublic, UserRegister, UserUpdate, UserUpdateMe,
        UsersPublic,
    },
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyCoursesQuery {
    /// Only return the enrollment for this course
    pub course_id: Option<Uuid>,
}

async fn enrollment_public(state: &AppState, enrollment: Enrollment) -> Result<UserCoursePublic> {
    let finished = state
        .db
        .finished_chapters(enrollment.user_id, enrollment.course_id)
        .await?;
    Ok(enrollment.to_public(finished))
}

/// Self-service signup. New accounts are always learners.
#[utoipa::path(
    post,
    path = "/api/v1/users/signup",
    request_body = UserRegister,
    responses(
        (status = 201, description = "User created", body = UserPublic),
        (status = 400, description = "Invalid input or email already registered"),
        (status = 409, description = "User name already taken"),
        (status = 429, description = "Too many signups")
    ),
    tag = "users"
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UserRegister>,
) -> Result<(StatusCode, Json<UserPublic>)> {
    payload.validate()?;

    if state.db.get_user_by_email(&payload.email).await?.is_some() {
        return Err(AppError::Validation(
            "The user with this email already exists in the system".to_string(),
        ));
    }

    let password_hash = state.auth_service.hash_password(&payload.password).await?;
    let user = state
        .db
        .create_user(&NewUser {
            email: payload.email,
            user_name: payload.user_name,
            password_hash,
            role: Role::Learner,
            is_active: true,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User signed up");
    Ok((StatusCode::CREATED, Json(user.to_public())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = UserPublic),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn read_user_me(AuthUser(user): AuthUser) -> Json<UserPublic> {
    Json(user.to_public())
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    request_body = UserUpdateMe,
    responses(
        (status = 200, description = "Profile updated", body = UserPublic),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or user name already taken")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn update_user_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<UserUpdateMe>,
) -> Result<Json<UserPublic>> {
    payload.validate()?;

    let updated = state
        .db
        .update_user(
            user.id,
            &UserChanges {
                email: payload.email,
                user_name: payload.user_name,
                ..UserChanges::default()
            },
        )
        .await?;

    Ok(Json(updated.to_public()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/me/password",
    request_body = UpdatePassword,
    responses(
        (status = 200, description = "Password updated", body = Message),
        (status = 400, description = "Incorrect or unchanged password")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn update_password_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<UpdatePassword>,
) -> Result<Json<Message>> {
    payload.validate()?;

    if !state
        .auth_service
        .verify_password(&payload.current_password, &user.password_hash)
        .await?
    {
        return Err(AppError::Validation("Incorrect password".to_string()));
    }

    let password_hash = state
        .auth_service
        .hash_password(&payload.new_password)
        .await?;
    state
        .db
        .update_user(
            user.id,
            &UserChanges {
                password_hash: Some(password_hash),
                ..UserChanges::default()
            },
        )
        .await?;

    Ok(Json(Message::new("Password updated successfully")))
}

/// Deactivates the caller's own account.
#[utoipa::path(
    delete,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Account deactivated", body = Message),
        (status = 403, description = "Admins cannot deactivate themselves")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn delete_user_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Message>> {
    if user.is_admin() {
        return Err(AppError::Forbidden(
            "Super users are not allowed to delete themselves".to_string(),
        ));
    }

    state.db.set_user_active(user.id, false).await?;
    tracing::info!(user_id = %user.id, "User deactivated own account");
    Ok(Json(Message::new("User deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me/courses",
    params(MyCoursesQuery),
    responses(
        (status = 200, description = "Enrollments of the current user", body = [UserCoursePublic])
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn read_my_courses(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<MyCoursesQuery>,
) -> Result<Json<Vec<UserCoursePublic>>> {
    let enrollments = state.db.list_enrollments(user.id).await?;

    let mut data = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        if query.course_id.is_some_and(|id| id != enrollment.course_id) {
            continue;
        }
        data.push(enrollment_public(&state, enrollment).await?);
    }

    Ok(Json(data))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/me/courses/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course to enroll in")),
    responses(
        (status = 201, description = "Enrolled", body = UserCoursePublic),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn enroll_course(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(course_id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<UserCoursePublic>)> {
    let enrollment = state.db.enroll(user.id, course_id).await?;

    tracing::info!(user_id = %user.id, course_id = %course_id, "User enrolled");
    Ok((StatusCode::CREATED, Json(enrollment.to_public(Vec::new()))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/me/courses/{course_id}",
    params(("course_id" = Uuid, Path, description = "Enrolled course")),
    request_body = UserCourseUpdate,
    responses(
        (status = 200, description = "Progress updated", body = UserCoursePublic),
        (status = 400, description = "Invalid progress values"),
        (status = 404, description = "Not enrolled in this course")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn update_my_course(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(course_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UserCourseUpdate>,
) -> Result<Json<UserCoursePublic>> {
    payload.validate()?;

    let enrollment = state
        .db
        .update_enrollment(user.id, course_id, &payload)
        .await?;

    Ok(Json(enrollment_public(&state, enrollment).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(Pagination),
    responses(
        (status = 200, description = "Users", body = UsersPublic),
        (status = 403, description = "Admin only")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn read_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<UsersPublic>> {
    page.validate()?;

    let users = state.db.list_users(page.skip, page.limit).await?;
    let count = if page.include_count {
        Some(state.db.count_users().await?)
    } else {
        None
    };

    Ok(Json(UsersPublic {
        data: users.iter().map(|u| u.to_public()).collect(),
        count,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserPublic),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email or user name already taken")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(payload): ApiJson<UserCreate>,
) -> Result<(StatusCode, Json<UserPublic>)> {
    payload.validate()?;

    let password_hash = state.auth_service.hash_password(&payload.password).await?;
    let user = state
        .db
        .create_user(&NewUser {
            email: payload.email,
            user_name: payload.user_name,
            password_hash,
            role: payload.role,
            is_active: payload.is_active,
        })
        .await?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, role = user.role.as_str(), "User created");
    Ok((StatusCode::CREATED, Json(user.to_public())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserPublic),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn read_user_by_id(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserPublic>> {
    let user = state
        .db
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User", id))?;

    Ok(Json(user.to_public()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated", body = UserPublic),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin only, or demoting/deactivating yourself"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email or user name already taken")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UserUpdate>,
) -> Result<Json<UserPublic>> {
    payload.validate()?;

    if admin.id == id
        && (payload.is_active == Some(false)
            || payload.role.is_some_and(|role| role != Role::Admin))
    {
        return Err(AppError::Forbidden(
            "Super users are not allowed to deactivate or demote themselves".to_string(),
        ));
    }

    let password_hash = match &payload.password {
        Some(password) => Some(state.auth_service.hash_password(password).await?),
        None => None,
    };

    let updated = state
        .db
        .update_user(
            id,
            &UserChanges {
                email: payload.email,
                user_name: payload.user_name,
                password_hash,
                role: payload.role,
                is_active: payload.is_active,
            },
        )
        .await?;

    Ok(Json(updated.to_public()))
}

/// Deactivates a user. Accounts are never hard-deleted.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated", body = Message),
        (status = 403, description = "Admin only, or deleting yourself"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Message>> {
    if admin.id == id {
        return Err(AppError::Forbidden(
            "Super users are not allowed to delete themselves".to_string(),
        ));
    }

    state.db.set_user_active(id, false).await?;
    tracing::info!(admin_id = %admin.id, user_id = %id, "User deactivated");
    Ok(Json(Message::new("User deleted successfully")))
}
