use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_token: Option<String>,
    pub gateway_timeout: Duration,
    pub session_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_url: require_env("MATCHER_API_URL")?,
            api_token: std::env::var("MATCHER_API_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            gateway_timeout: Duration::from_secs(
                std::env::var("GATEWAY_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse::<u64>()
                    .context("GATEWAY_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            session_dir: std::env::var("SESSION_DIR")
                .unwrap_or_else(|_| ".sessions".to_string())
                .into(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
