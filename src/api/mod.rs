//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for CodePath, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and per-route rate limits
//! - [`api::extract`](crate::api::extract) - Extractors that reject with the JSON error envelope
//! - [`api::docs`](crate::api::docs) - OpenAPI document
//!
//! # API Endpoints
//!
//! All paths below are relative to the configured prefix (default `/api/v1`).
//!
//! ## Login
//! - `POST /login/access-token` - Form login, returns a token and sets the session cookie
//! - `POST /login/test-token` - Returns the user behind the token
//! - `POST /logout` - Clears the session cookie
//!
//! ## Users
//! - `POST /users/signup` - Self-service signup
//! - `GET|PATCH|DELETE /users/me` - Own profile
//! - `PATCH /users/me/password` - Change own password
//! - `GET /users/me/courses` - Own enrollments
//! - `POST|PATCH /users/me/courses/{course_id}` - Enroll, update progress
//! - `GET|POST /users`, `GET|PATCH|DELETE /users/{id}` - Administration
//!
//! ## Courses and chapters
//! - `GET|POST /courses`, `GET|PATCH|DELETE /courses/{id}`
//! - `GET /courses/{id}/chapters`
//! - `GET|POST /chapters`, `GET|PATCH|DELETE /chapters/{id}`
//! - `GET|POST /chapters/{id}/completed` - Completion state of the current user
//!
//! ## Services
//! - `POST /piston/execute` - Run code on Piston
//! - `POST /ai/generate` - Tutoring hint
//! - `GET /ai/health`
//! - `GET /stats`
//!
//! `GET /health` lives outside the prefix.
//!
//! # Authentication
//!
//! Protected endpoints accept the `access_token` cookie set at login, or the
//! same token in the `Authorization` header:
//! ```text
//! Authorization: Bearer <token>
//! ```
//! The cookie wins when both are present.
//!
//! # OpenAPI Documentation
//!
//! The document is served at `{prefix}/openapi.json`. When the `swagger-ui`
//! feature is enabled, interactive documentation is available at `/docs`.

/// OpenAPI document.
pub mod docs;
/// Extractors with JSON-envelope rejections.
pub mod extract;
/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use crate::types::AppError;
use crate::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

async fn health() -> &'static str {
    "OK"
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(docs::ApiDoc::openapi())
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Builds the complete application: API routes under the configured prefix,
/// the health probe and the shared tower-http stack.
pub fn app(state: AppState) -> Router {
    let server = &state.config.server;

    let api = routes::create_router(&state).route("/openapi.json", get(openapi_json));

    let router = Router::new()
        .route("/health", get(health))
        .nest(&server.api_prefix, api)
        .fallback(route_not_found);

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/docs")
            .url("/docs/openapi.json", docs::ApiDoc::openapi()),
    );

    router
        .layer(RequestBodyLimitLayer::new(server.body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
