//! Authentication: session tokens, password hashing and the per-request
//! auth dependency.
//!
//! # Module Structure
//!
//! - [`auth::jwt`](crate::auth::jwt) - HS256 token issuing and verification
//! - [`auth::password`](crate::auth::password) - Argon2id hashing
//! - [`auth::middleware`](crate::auth::middleware) - `AuthUser` / `AdminUser` extractors
//!
//! # Token delivery
//!
//! Login sets an HTTP-only `access_token` cookie and also returns the token
//! in the body. Requests may authenticate with either; the cookie wins when
//! both are present:
//!
//! ```text
//! Cookie: access_token=<token>
//! Authorization: Bearer <token>
//! ```
//!
//! Tokens are stateless and are not revoked server-side; logout only clears
//! the cookie.

/// HS256 token issuing and verification.
pub mod jwt;
/// Extractors resolving the current user for protected handlers.
pub mod middleware;
/// Argon2id password hashing.
pub mod password;

pub use jwt::TokenIssuer;
pub use middleware::{AdminUser, AuthUser};

use crate::db::{Database, User};
use crate::types::{AppError, AuthError, Result};
use chrono::Duration;
use uuid::Uuid;

/// Authentication service combining the token issuer with password hashing.
///
/// Argon2 runs on Tokio's blocking pool so request workers are never stalled
/// by hashing.
pub struct AuthService {
    issuer: TokenIssuer,
    access_ttl: Duration,
}

impl AuthService {
    /// Creates a new AuthService.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for signing tokens (at least 32 bytes)
    /// * `access_ttl` - Lifetime of issued access tokens
    pub fn new(jwt_secret: &str, access_ttl: Duration) -> Self {
        Self {
            issuer: TokenIssuer::new(jwt_secret.as_bytes()),
            access_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || password::hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }

    /// Issues an access token with the configured lifetime.
    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String> {
        self.issuer.issue(user_id, self.access_ttl)
    }

    pub fn verify_token(&self, token: &str) -> std::result::Result<Uuid, AuthError> {
        self.issuer.verify(token)
    }

    /// Checks credentials for login.
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn authenticate(&self, db: &Database, email: &str, password: &str) -> Result<User> {
        let user = db
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            return Err(AuthError::InactiveUser.into());
        }

        Ok(user)
    }
}
