//! CLI module for CodePath
//!
//! Provides command-line interface parsing for the codepath-server binary.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "codepath.toml";

/// CodePath - coding-course backend
///
/// Serves the course, progress, code-execution and AI-hint API.
#[derive(Parser, Debug)]
#[command(
    name = "codepath-server",
    author = "CodePath <dev@codepath.dev>",
    version,
    about = "CodePath - backend for an interactive coding-course platform",
    after_help = "EXAMPLES:\n    \
                  codepath-server                          # Defaults, codepath.toml if present\n    \
                  codepath-server --config prod.toml       # Use a custom config file\n    \
                  codepath-server --host 0.0.0.0 -p 8080   # Override the listen address"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "CODEPATH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host address to bind, overrides the config file and HOST
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on, overrides the config file and PORT
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Cli {
    /// The config file to load: the explicit path, else `codepath.toml`
    /// when it exists, else none (defaults plus environment).
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(|| {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            default.exists().then(|| default.to_path_buf())
        })
    }
}
