mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use codepath::types::{Role, Token};
use common::{TestApp, PASSWORD, TOKEN_MINUTES};
use serde_json::Value;

const LOGIN: &str = "/api/v1/login/access-token";

async fn login(app: &TestApp, email: &str, password: &str) -> axum_test::TestResponse {
    app.server
        .post(LOGIN)
        .form(&[("username", email), ("password", password)])
        .await
}

fn reason(body: &Value) -> &str {
    body["error"]["reason"].as_str().unwrap_or_default()
}

// ============= Login =============

#[tokio::test]
async fn test_login_returns_token_and_sets_cookie() {
    let app = TestApp::new().await;
    let user = app.create_user("ada@example.com", Role::Learner).await;

    let response = login(&app, "ada@example.com", PASSWORD).await;
    response.assert_status(StatusCode::OK);

    let token: Token = response.json();
    assert_eq!(token.token_type, "bearer");
    assert_eq!(
        app.state.auth_service.verify_token(&token.access_token),
        Ok(user.id)
    );

    let set_cookie = response.header("set-cookie");
    let set_cookie = set_cookie.to_str().unwrap();
    assert!(set_cookie.starts_with(&format!("access_token={}", token.access_token)));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains(&format!("Max-Age={}", TOKEN_MINUTES * 60)));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_uniformly() {
    let app = TestApp::new().await;
    app.create_user("ada@example.com", Role::Learner).await;

    let wrong_password = login(&app, "ada@example.com", "not-the-password").await;
    let unknown_email = login(&app, "nobody@example.com", PASSWORD).await;

    wrong_password.assert_status(StatusCode::UNAUTHORIZED);
    unknown_email.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.text(), unknown_email.text());
    assert_eq!(reason(&wrong_password.json()), "invalid_credentials");
    assert_eq!(wrong_password.header("www-authenticate"), "Bearer");
}

#[tokio::test]
async fn test_login_rejects_inactive_user() {
    let app = TestApp::new().await;
    let user = app.create_user("ada@example.com", Role::Learner).await;
    app.state.db.set_user_active(user.id, false).await.unwrap();

    let response = login(&app, "ada@example.com", PASSWORD).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response.json()), "inactive_user");
}

#[tokio::test]
async fn test_login_requires_form_fields() {
    let app = TestApp::new().await;

    let response = app
        .server
        .post(LOGIN)
        .form(&[("username", "ada@example.com")])
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["kind"], "validation_error");
}

// ============= Token delivery =============

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let app = TestApp::new().await;
    app.create_user("ada@example.com", Role::Learner).await;

    let cookie = login(&app, "ada@example.com", PASSWORD)
        .await
        .cookie("access_token");

    let response = app.server.get("/api/v1/users/me").add_cookie(cookie).await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["role"], "learner");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_bearer_header_authenticates() {
    let app = TestApp::new().await;
    let (user, token) = app.learner("ada@example.com").await;

    let response = app
        .server
        .post("/api/v1/login/test-token")
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["id"], user.id.to_string());
}

#[tokio::test]
async fn test_cookie_wins_over_header() {
    let app = TestApp::new().await;
    let (_, ada_token) = app.learner("ada@example.com").await;
    let (_, bob_token) = app.learner("bob@example.com").await;

    let response = app
        .server
        .get("/api/v1/users/me")
        .add_cookie(axum_extra::extract::cookie::Cookie::new(
            "access_token",
            ada_token,
        ))
        .authorization_bearer(&bob_token)
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["email"], "ada@example.com");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.server.get("/api/v1/users/me").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["kind"], "authentication_error");
    assert_eq!(reason(&body), "missing_token");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = TestApp::new().await;
    let user = app.create_user("ada@example.com", Role::Learner).await;
    let token = app
        .state
        .auth_service
        .issuer()
        .issue_at(user.id, Duration::minutes(5), Utc::now() - Duration::hours(1))
        .unwrap();

    let response = app
        .server
        .get("/api/v1/users/me")
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response.json()), "expired_token");
}

#[tokio::test]
async fn test_tampered_signature_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.learner("ada@example.com").await;

    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let mut signature: Vec<char> = parts[2].chars().collect();
    signature[5] = if signature[5] == 'A' { 'B' } else { 'A' };
    parts[2] = signature.into_iter().collect();
    let tampered = parts.join(".");

    let response = app
        .server
        .get("/api/v1/users/me")
        .authorization_bearer(&tampered)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response.json()), "invalid_token");
}

#[tokio::test]
async fn test_garbage_token_is_malformed() {
    let app = TestApp::new().await;

    let response = app
        .server
        .get("/api/v1/users/me")
        .authorization_bearer("definitely-not-a-jwt")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response.json()), "malformed_token");
}

#[tokio::test]
async fn test_token_of_deactivated_user_is_rejected() {
    let app = TestApp::new().await;
    let (user, token) = app.learner("ada@example.com").await;
    app.state.db.set_user_active(user.id, false).await.unwrap();

    let response = app
        .server
        .get("/api/v1/users/me")
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response.json()), "inactive_user");
}

#[tokio::test]
async fn test_token_for_unknown_user_is_rejected() {
    let app = TestApp::new().await;
    let token = app
        .state
        .auth_service
        .issue_access_token(uuid::Uuid::new_v4())
        .unwrap();

    let response = app
        .server
        .post("/api/v1/login/test-token")
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(reason(&response.json()), "user_not_found");
}

// ============= Logout =============

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = TestApp::new().await;

    let response = app.server.post("/api/v1/logout").await;

    response.assert_status(StatusCode::OK);
    let set_cookie = response.header("set-cookie");
    let set_cookie = set_cookie.to_str().unwrap();
    assert!(set_cookie.starts_with("access_token=;"));
    assert!(set_cookie.contains("Max-Age=0"));

    let body: Value = response.json();
    assert_eq!(body["message"], "Successfully logged out");
}

// ============= Rate limiting =============

#[tokio::test]
async fn test_sixth_login_in_window_is_rate_limited() {
    let app = TestApp::with_rate_limits(&[("login", "5/minute")]).await;
    app.create_user("ada@example.com", Role::Learner).await;

    for attempt in 1..=5u64 {
        let response = login(&app, "ada@example.com", "wrong-password").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.header("x-ratelimit-limit"), "5");
        assert_eq!(
            response.header("x-ratelimit-remaining"),
            (5 - attempt).to_string().as_str()
        );
    }

    // Correct credentials do not bypass an exhausted budget.
    let response = login(&app, "ada@example.com", PASSWORD).await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = response
        .header("retry-after")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    let body: Value = response.json();
    assert_eq!(body["error"]["kind"], "rate_limit_exceeded");
    assert_eq!(body["error"]["retry_after"], retry_after);
}

#[tokio::test]
async fn test_rate_limits_are_per_route() {
    let app = TestApp::with_rate_limits(&[("login", "1/minute")]).await;
    app.create_user("ada@example.com", Role::Learner).await;

    login(&app, "ada@example.com", PASSWORD)
        .await
        .assert_status(StatusCode::OK);
    login(&app, "ada@example.com", PASSWORD)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    let signup = app
        .server
        .post("/api/v1/users/signup")
        .json(&serde_json::json!({"email": "bob@example.com", "password": PASSWORD}))
        .await;
    signup.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_unlimited_routes_carry_no_rate_headers() {
    let app = TestApp::new().await;

    let response = app.server.get("/api/v1/courses").await;

    response.assert_status(StatusCode::OK);
    assert!(response.maybe_header("x-ratelimit-limit").is_none());
}
