//! # CodePath Server
//!
//! Backend for an interactive coding-course platform: users, courses,
//! chapters and learner progress, sandboxed code execution through Piston
//! and AI tutoring hints through an OpenAI-compatible LLM endpoint.
//!
//! ## Overview
//!
//! CodePath can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `codepath-server` binary
//! 2. **As a library** - Build the router from your own [`AppState`]
//!
//! ### Embedding the router
//!
//! ```rust,ignore
//! use codepath::{api, AppState, utils::config::Config};
//!
//! let config = Config::load(None)?;
//! let state = AppState::from_config(config).await?;
//! let app = api::app(state);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `swagger-ui` | Interactive API docs at `/docs` |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`auth`] - Session tokens, password hashing and the auth extractors
//! - [`ratelimit`] - Fixed-window per-route rate limiting
//! - [`db`] - libsql storage (local file, in-memory or Turso)
//! - [`llm`] - LLM client abstraction
//! - [`services`] - Piston execution and hint generation
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Session tokens, password hashing and auth extractors.
pub mod auth;
/// Command-line interface.
pub mod cli;
/// Database client (libsql / Turso).
pub mod db;
/// LLM client abstraction.
pub mod llm;
/// Per-route rate limiting.
pub mod ratelimit;
/// Piston code execution and AI hints.
pub mod services;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration loading.
pub mod utils;

// Re-export commonly used types
pub use auth::AuthService;
pub use db::Database;
pub use llm::{LlmClient, OpenAiCompatClient};
pub use ratelimit::{RateLimiter, RateRule};
pub use services::{HintService, PistonClient};
pub use types::{AppError, Result};

use std::sync::Arc;
use std::time::Duration;
use utils::config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration
    pub config: Arc<Config>,
    /// Database client
    pub db: Arc<Database>,
    /// Token issuing and password hashing
    pub auth_service: Arc<AuthService>,
    /// Per-route request counters
    pub rate_limiter: RateLimiter,
    /// Code execution upstream
    pub piston: Arc<PistonClient>,
    /// AI hint generation
    pub hints: Arc<HintService>,
}

impl AppState {
    /// Wires every service from a validated configuration.
    pub async fn from_config(config: Config) -> Result<Self> {
        let jwt_secret = config
            .jwt_secret()
            .map_err(|e| AppError::Config(e.to_string()))?;
        let rules = config
            .rate_rules()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let access_ttl = chrono::Duration::try_minutes(config.auth.access_token_minutes)
            .ok_or_else(|| AppError::Config("auth.access_token_minutes is out of range".into()))?;

        let db = Database::connect(&config.database).await?;
        let auth_service = AuthService::new(&jwt_secret, access_ttl);
        let piston = PistonClient::new(
            &config.piston.url,
            Duration::from_secs(config.piston.timeout_secs),
        )?;

        if config.ai_api_key().is_none() {
            tracing::warn!(
                env = %config.ai.api_key_env,
                "No AI provider key set; hint requests will fail upstream"
            );
        }
        let llm = OpenAiCompatClient::new(
            &config.ai.api_base,
            config.ai_api_key(),
            &config.ai.model,
            Duration::from_secs(config.ai.timeout_secs),
        )?;

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            auth_service: Arc::new(auth_service),
            rate_limiter: RateLimiter::in_memory(rules),
            piston: Arc::new(piston),
            hints: Arc::new(HintService::new(Arc::new(llm))),
        })
    }
}
