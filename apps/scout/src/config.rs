use std::path::PathBuf;

use anyhow::{Context, Result};

/// Process configuration loaded from environment variables.
/// Startup fails if a required variable is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    pub github_api_url: String,
    pub redis_url: String,
    /// Optional JSON file overriding the built-in discovery settings.
    pub settings_path: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            github_token: require_env("GITHUB_TOKEN")?,
            github_api_url: env_or("GITHUB_API_URL", "https://api.github.com"),
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
            settings_path: std::env::var("DISCOVERY_SETTINGS_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
