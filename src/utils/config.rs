//! Server configuration.
//!
//! Loaded from an optional TOML file (`codepath.toml`), then overridden by
//! environment variables. Secrets never live in the file; it only names the
//! environment variables holding them:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! cors_origins = ["https://app.codepath.dev"]
//!
//! [auth]
//! jwt_secret_env = "JWT_SECRET"
//! access_token_minutes = 60
//!
//! [rate_limits]
//! login = "10/minute"
//! ```

use crate::ratelimit::RateRule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Shortest accepted JWT signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest accepted access-token lifetime (one leap year).
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Environment variable '{name}' has an invalid value '{value}'")]
    InvalidEnvVar { name: String, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Route key to rule, e.g. `login = "5/minute"`. Missing keys fall back
    /// to the built-in defaults.
    #[serde(default)]
    pub rate_limits: HashMap<String, String>,

    #[serde(default)]
    pub piston: PistonConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Browser origins allowed to make credentialed requests.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Trust the first `X-Forwarded-For` entry as the client address.
    #[serde(default)]
    pub trust_forwarded_for: bool,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Interval of the rate-limit counter sweep.
    #[serde(default = "default_purge_interval")]
    pub rate_limit_purge_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_body_limit() -> usize {
    1024 * 1024
}

fn default_purge_interval() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            cors_origins: default_cors_origins(),
            api_prefix: default_api_prefix(),
            trust_forwarded_for: false,
            body_limit_bytes: default_body_limit(),
            rate_limit_purge_secs: default_purge_interval(),
        }
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable name containing the JWT secret
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,

    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,

    /// Adds `Secure` to the session cookie. Enable behind HTTPS.
    #[serde(default)]
    pub cookie_secure: bool,
}

fn default_jwt_secret_env() -> String {
    "JWT_SECRET".to_string()
}

fn default_access_token_minutes() -> i64 {
    60 * 24 * 8
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: default_jwt_secret_env(),
            access_token_minutes: default_access_token_minutes(),
            cookie_secure: false,
        }
    }
}

// ============= Database Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local database path, or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Environment variable for the Turso URL (optional cloud config)
    #[serde(default = "default_turso_url_env")]
    pub turso_url_env: String,

    /// Environment variable for the Turso auth token
    #[serde(default = "default_turso_token_env")]
    pub turso_token_env: String,
}

fn default_database_url() -> String {
    "./data/codepath.db".to_string()
}

fn default_turso_url_env() -> String {
    "TURSO_DATABASE_URL".to_string()
}

fn default_turso_token_env() -> String {
    "TURSO_AUTH_TOKEN".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            turso_url_env: default_turso_url_env(),
            turso_token_env: default_turso_token_env(),
        }
    }
}

// ============= Upstream Services =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PistonConfig {
    #[serde(default = "default_piston_url")]
    pub url: String,

    #[serde(default = "default_piston_timeout")]
    pub timeout_secs: u64,
}

fn default_piston_url() -> String {
    "https://emkc.org/api/v2/piston/execute".to_string()
}

fn default_piston_timeout() -> u64 {
    10
}

impl Default for PistonConfig {
    fn default() -> Self {
        Self {
            url: default_piston_url(),
            timeout_secs: default_piston_timeout(),
        }
    }
}

/// OpenAI-compatible chat completions endpoint used for hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_ai_base")]
    pub api_base: String,

    /// Environment variable name containing the provider API key
    #[serde(default = "default_ai_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_ai_model")]
    pub model: String,

    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

fn default_ai_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_ai_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_ai_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_ai_timeout() -> u64 {
    30
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_base: default_ai_base(),
            api_key_env: default_ai_key_env(),
            model: default_ai_model(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

/// Bootstrap admin account created at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub email: Option<String>,

    pub user_name: Option<String>,

    /// Environment variable name containing the admin password
    #[serde(default = "default_admin_password_env")]
    pub password_env: String,
}

fn default_admin_password_env() -> String {
    "FIRST_SUPERUSER_PASSWORD".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: None,
            user_name: None,
            password_env: default_admin_password_env(),
        }
    }
}

/// Built-in per-route limits.
pub fn default_rate_limits() -> HashMap<String, String> {
    [
        ("login", "5/minute"),
        ("logout", "10/minute"),
        ("test_token", "5/minute"),
        ("signup", "5/minute"),
        ("hints", "50/day"),
        ("execute", "30/minute"),
    ]
    .into_iter()
    .map(|(route, rule)| (route.to_string(), rule.to_string()))
    .collect()
}

// ============= Loading & Validation =============

impl Config {
    /// Loads the file (if given), applies environment overrides and validates.
    ///
    /// A missing explicit path is an error; with no path the defaults are
    /// used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar {
                    name: name.to_string(),
                    value,
                })
        }

        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = parsed("PORT", v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            self.server.log_format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::InvalidEnvVar {
                        name: "LOG_FORMAT".to_string(),
                        value: v,
                    })
                }
            };
        }
        if let Some(v) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("TRUST_FORWARDED_FOR") {
            self.server.trust_forwarded_for = parsed("TRUST_FORWARDED_FOR", v)?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = lookup("ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.auth.access_token_minutes = parsed("ACCESS_TOKEN_EXPIRE_MINUTES", v)?;
        }
        if let Some(v) = lookup("COOKIE_SECURE") {
            self.auth.cookie_secure = parsed("COOKIE_SECURE", v)?;
        }
        if let Some(v) = lookup("PISTON_API_URL") {
            self.piston.url = v;
        }
        if let Some(v) = lookup("PISTON_TIMEOUT") {
            self.piston.timeout_secs = parsed("PISTON_TIMEOUT", v)?;
        }
        if let Some(v) = lookup("AI_API_BASE") {
            self.ai.api_base = v;
        }
        if let Some(v) = lookup("AI_MODEL") {
            self.ai.model = v;
        }
        if let Some(v) = lookup("FIRST_SUPERUSER_EMAIL") {
            self.admin.email = Some(v);
        }
        if let Some(v) = lookup("FIRST_SUPERUSER_USERNAME") {
            self.admin.user_name = Some(v);
        }

        for route in default_rate_limits().into_keys() {
            let name = format!("RATE_LIMIT_{}", route.to_ascii_uppercase());
            if let Some(v) = lookup(&name) {
                self.rate_limits.insert(route, v);
            }
        }

        Ok(())
    }

    /// Checks everything that can be checked without the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.jwt_secret()?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::ValidationError(format!(
                "{} must be at least {MIN_JWT_SECRET_LEN} bytes",
                self.auth.jwt_secret_env
            )));
        }
        if !(1..=MAX_ACCESS_TOKEN_MINUTES).contains(&self.auth.access_token_minutes) {
            return Err(ConfigError::ValidationError(format!(
                "auth.access_token_minutes must be between 1 and {MAX_ACCESS_TOKEN_MINUTES}"
            )));
        }
        if !self.server.api_prefix.starts_with('/') || self.server.api_prefix.ends_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "server.api_prefix '{}' must start with '/' and not end with one",
                self.server.api_prefix
            )));
        }
        if self.piston.timeout_secs == 0 || self.ai.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Upstream timeouts must be at least one second".to_string(),
            ));
        }
        if self.server.rate_limit_purge_secs == 0 {
            return Err(ConfigError::ValidationError(
                "server.rate_limit_purge_secs must be positive".to_string(),
            ));
        }
        self.rate_rules()?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get the JWT secret from the environment
    pub fn jwt_secret(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.auth.jwt_secret_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.auth.jwt_secret_env.clone()))
    }

    /// Provider key for hints. Absent keys are allowed; hint calls then fail
    /// upstream.
    pub fn ai_api_key(&self) -> Option<String> {
        self.resolve_env(&self.ai.api_key_env)
            .filter(|key| !key.is_empty())
    }

    /// Effective per-route rules: built-in defaults overlaid with configured
    /// entries.
    pub fn rate_rules(&self) -> Result<HashMap<String, RateRule>, ConfigError> {
        let mut merged = default_rate_limits();
        merged.extend(self.rate_limits.clone());

        merged
            .into_iter()
            .map(|(route, rule)| {
                RateRule::parse(&rule)
                    .map(|parsed| (route.clone(), parsed))
                    .map_err(|_| {
                        ConfigError::ValidationError(format!(
                            "Invalid rate limit '{rule}' for route '{route}'"
                        ))
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.api_prefix, "/api/v1");
        assert_eq!(config.auth.jwt_secret_env, "JWT_SECRET");
        assert_eq!(config.auth.access_token_minutes, 11_520);
        assert_eq!(config.ai.model, "gemini-2.0-flash");
        assert!(config.admin.email.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml(
            r#"
[server]
port = 9000
log_format = "json"

[auth]
jwt_secret_env = "CODEPATH_SECRET"

[rate_limits]
login = "10/minute"
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.auth.jwt_secret_env, "CODEPATH_SECRET");
        assert_eq!(config.auth.access_token_minutes, 11_520);
        assert_eq!(config.database.url, "./data/codepath.db");

        let rules = config.rate_rules().unwrap();
        assert_eq!(rules["login"], RateRule::new(10, Duration::from_secs(60)));
        assert_eq!(rules["hints"], RateRule::new(50, Duration::from_secs(86_400)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();

        config
            .apply_env(env(&[
                ("PORT", "8080"),
                ("LOG_FORMAT", "JSON"),
                ("CORS_ORIGINS", "https://a.dev, https://b.dev,"),
                ("ACCESS_TOKEN_EXPIRE_MINUTES", "15"),
                ("COOKIE_SECURE", "true"),
                ("FIRST_SUPERUSER_EMAIL", "admin@codepath.dev"),
                ("RATE_LIMIT_LOGIN", "3/5minutes"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.server.cors_origins, ["https://a.dev", "https://b.dev"]);
        assert_eq!(config.auth.access_token_minutes, 15);
        assert!(config.auth.cookie_secure);
        assert_eq!(config.admin.email.as_deref(), Some("admin@codepath.dev"));
        assert_eq!(
            config.rate_rules().unwrap()["login"],
            RateRule::new(3, Duration::from_secs(300))
        );
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = Config::default();

        let result = config.apply_env(env(&[("PORT", "eighty")]));

        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvVar { ref name, .. }) if name == "PORT"
        ));
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = Config::default();
        config.auth.jwt_secret_env = "CODEPATH_TEST_SHORT_SECRET".to_string();
        std::env::set_var("CODEPATH_TEST_SHORT_SECRET", "too-short");

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_missing_secret() {
        let mut config = Config::default();
        config.auth.jwt_secret_env = "CODEPATH_TEST_UNSET_SECRET".to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_rate_rule() {
        let mut config = Config::default();
        config.auth.jwt_secret_env = "CODEPATH_TEST_GOOD_SECRET".to_string();
        std::env::set_var(
            "CODEPATH_TEST_GOOD_SECRET",
            "a-secret-that-is-comfortably-longer-than-32",
        );
        assert!(config.validate().is_ok());

        config
            .rate_limits
            .insert("login".to_string(), "lots/minute".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        config
            .rate_limits
            .insert("login".to_string(), "1/10000000000000000000seconds".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_bounds_token_lifetime() {
        let mut config = Config::default();
        config.auth.jwt_secret_env = "CODEPATH_TEST_LIFETIME_SECRET".to_string();
        std::env::set_var(
            "CODEPATH_TEST_LIFETIME_SECRET",
            "a-secret-that-is-comfortably-longer-than-32",
        );

        config.auth.access_token_minutes = MAX_ACCESS_TOKEN_MINUTES;
        assert!(config.validate().is_ok());

        for minutes in [0, -5, MAX_ACCESS_TOKEN_MINUTES + 1, i64::MAX] {
            config.auth.access_token_minutes = minutes;
            assert!(
                matches!(config.validate(), Err(ConfigError::ValidationError(_))),
                "{minutes} minutes should be rejected"
            );
        }
    }
}
