use crate::db::User;
use crate::types::{AppError, AuthError, Result, Role};
use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;

/// Name of the HTTP-only cookie carrying the session token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Finds the session token: cookie first, then `Authorization: Bearer`.
pub fn locate_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolves the user behind the request's token.
///
/// The subject must still exist and be active; a user deactivated after the
/// token was issued is rejected.
pub async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let token = locate_token(headers).ok_or(AuthError::MissingToken)?;
    let user_id = state.auth_service.verify_token(&token)?;

    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if !user.is_active {
        return Err(AuthError::InactiveUser.into());
    }

    Ok(user)
}

/// The authenticated user, as a handler parameter.
///
/// ```ignore
/// async fn read_user_me(AuthUser(user): AuthUser) -> Json<UserPublic> {
///     Json(user.to_public())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(AuthUser(user.clone()));
        }

        let user = resolve_user(state, &parts.headers).await.inspect_err(|e| {
            tracing::debug!(path = %parts.uri.path(), error = %e, "Authentication rejected");
        })?;

        parts.extensions.insert(user.clone());
        Ok(AuthUser(user))
    }
}

/// An authenticated user holding the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if user.role != Role::Admin {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Admin route denied");
            return Err(AppError::forbidden());
        }

        Ok(AdminUser(user))
    }
}
