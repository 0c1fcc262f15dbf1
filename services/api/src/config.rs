//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    /// Model used by the analysis pipeline's content generation.
    pub analysis_model: String,
    /// Model used for quiz question generation.
    pub question_model: String,
    /// Directory where raw uploaded files are kept until they expire.
    pub upload_dir: PathBuf,
    /// How long an uploaded document stays usable for new analysis requests.
    pub retention_window: Duration,
    pub max_upload_bytes: usize,
    /// Number of analysis workers draining the queue.
    pub analysis_workers: usize,
    /// Capacity of the bounded analysis queue; a full queue rejects submits.
    pub analysis_queue_capacity: usize,
    /// Per-task ceiling on one content-generation call.
    pub analysis_timeout: Duration,
    /// Requests stuck in `processing` longer than this get marked as errored.
    pub stall_deadline: Duration,
    /// How often the stalled-request reaper wakes up.
    pub reaper_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let analysis_model =
            std::env::var("ANALYSIS_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let question_model =
            std::env::var("QUESTION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        // --- Pipeline tuning ---
        let retention_window = duration_secs_var("RETENTION_SECONDS", 3600)?;
        let max_upload_bytes = usize_var("MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?;
        let analysis_workers = usize_var("ANALYSIS_WORKERS", 4)?;
        let analysis_queue_capacity = usize_var("ANALYSIS_QUEUE_CAPACITY", 64)?;
        let analysis_timeout = duration_secs_var("ANALYSIS_TIMEOUT_SECONDS", 120)?;
        let stall_deadline = duration_secs_var("STALL_DEADLINE_SECONDS", 600)?;
        let reaper_interval = duration_secs_var("REAPER_INTERVAL_SECONDS", 60)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            analysis_model,
            question_model,
            upload_dir,
            retention_window,
            max_upload_bytes,
            analysis_workers,
            analysis_queue_capacity,
            analysis_timeout,
            stall_deadline,
            reaper_interval,
        })
    }
}

fn usize_var(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn duration_secs_var(name: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}
