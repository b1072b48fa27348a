use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Directory backing the local fallback store.
    pub data_dir: PathBuf,
    /// Autosave debounce window in milliseconds; 0 disables coalescing.
    pub autosave_debounce_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            data_dir: std::env::var("FOLIO_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            autosave_debounce_ms: std::env::var("FOLIO_AUTOSAVE_DEBOUNCE_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse::<u64>()
                .context("FOLIO_AUTOSAVE_DEBOUNCE_MS must be a number of milliseconds")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
