use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Why a request failed authentication.
///
/// Every variant maps to `401 Unauthorized`; the variant name is reported as
/// the `reason` field of the error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User account is inactive")]
    InactiveUser,
}

impl AuthError {
    /// Machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::UserNotFound => "user_not_found",
            AuthError::InactiveUser => "inactive_user",
        }
    }
}

/// Which upstream collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Piston,
    Llm,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::Piston => f.write_str("code execution service"),
            Upstream::Llm => f.write_str("AI hint service"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("{service} error: {message}")]
    Upstream {
        service: Upstream,
        message: String,
        timed_out: bool,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error kind used in the JSON envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Auth(_) => "authentication_error",
            AppError::Forbidden(_) => "authorization_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::RateLimited { .. } => "rate_limit_exceeded",
            AppError::Upstream { .. } => "upstream_service_error",
            AppError::Database(_) => "database_error",
            AppError::Config(_) | AppError::Internal(_) => "internal_error",
        }
    }

    pub fn not_found(item: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{item} with id {id} not found"))
    }

    pub fn forbidden() -> Self {
        AppError::Forbidden("Not enough permissions for this resource".to_string())
    }

    /// Wraps a transport failure talking to an upstream service.
    pub fn upstream(service: Upstream, err: reqwest::Error) -> Self {
        AppError::Upstream {
            service,
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::Auth(err) => err.to_string(),
            AppError::RateLimited { retry_after } => {
                format!("Rate limit exceeded. Please try again in {retry_after} seconds.")
            }
            AppError::Upstream {
                service,
                timed_out: true,
                ..
            } => format!("The {service} did not respond in time"),
            AppError::Upstream { service, .. } => format!("The {service} is unavailable"),
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Upstream { service, message, .. } => {
                tracing::warn!(%service, error = %message, "upstream call failed");
            }
            _ if status.is_server_error() => {
                tracing::error!(kind = self.kind(), error = %self, "request failed");
            }
            _ => {}
        }

        let mut error = json!({
            "kind": self.kind(),
            "message": self.public_message(),
        });

        match &self {
            AppError::Auth(err) => {
                error["reason"] = json!(err.reason());
            }
            AppError::RateLimited { retry_after } => {
                error["retry_after"] = json!(retry_after);
            }
            _ => {}
        }

        let body = Json(json!({ "error": error }));

        match self {
            AppError::RateLimited { retry_after } => (
                status,
                [(header::RETRY_AFTER, retry_after.to_string())],
                body,
            )
                .into_response(),
            AppError::Auth(_) => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<libsql::Error> for AppError {
    fn from(err: libsql::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
