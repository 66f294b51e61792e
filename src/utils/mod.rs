/// Configuration loading (TOML file plus environment overrides).
pub mod config;
