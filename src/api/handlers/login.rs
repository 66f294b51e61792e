use crate::{
    api::extract::ApiForm,
    auth::{middleware::ACCESS_TOKEN_COOKIE, AuthUser},
    types::{LoginForm, Message, Result, Token, UserPublic},
    AppState,
};
use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

fn session_cookie(value: String, max_age: time::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .max_age(max_age)
        .build()
}

/// OAuth2 password-flow login. `username` carries the email.
#[utoipa::path(
    post,
    path = "/api/v1/login/access-token",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful, session cookie set", body = Token),
        (status = 400, description = "Malformed form"),
        (status = 401, description = "Incorrect email or password, or inactive user"),
        (status = 429, description = "Too many login attempts")
    ),
    tag = "login"
)]
pub async fn login_access_token(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiForm(form): ApiForm<LoginForm>,
) -> Result<(CookieJar, Json<Token>)> {
    let user = state
        .auth_service
        .authenticate(&state.db, &form.username, &form.password)
        .await
        .inspect_err(|e| tracing::warn!(email = %form.username, error = %e, "Login failed"))?;

    let token = state.auth_service.issue_access_token(user.id)?;
    let max_age = time::Duration::seconds(state.auth_service.access_ttl().num_seconds());
    let cookie = session_cookie(token.clone(), max_age, state.config.auth.cookie_secure);

    tracing::info!(user_id = %user.id, "User logged in");
    Ok((jar.add(cookie), Json(Token::bearer(token))))
}

/// Clears the session cookie. Issued tokens stay valid until they expire.
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = Message),
        (status = 429, description = "Too many requests")
    ),
    tag = "login"
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Message>) {
    let cleared = session_cookie(
        String::new(),
        time::Duration::ZERO,
        state.config.auth.cookie_secure,
    );
    (
        jar.add(cleared),
        Json(Message::new("Successfully logged out")),
    )
}

/// Echoes the user behind the presented token.
#[utoipa::path(
    post,
    path = "/api/v1/login/test-token",
    responses(
        (status = 200, description = "Token is valid", body = UserPublic),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 429, description = "Too many requests")
    ),
    security(("bearer" = []), ("cookie" = [])),
    tag = "login"
)]
pub async fn test_token(AuthUser(user): AuthUser) -> Json<UserPublic> {
    Json(user.to_public())
}
