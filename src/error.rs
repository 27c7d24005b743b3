use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AstroError {
    #[error("Database not found: {}", .0.display())]
    WarehouseNotFound(PathBuf),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid arguments for {tool}: {message}")]
    ToolArguments { tool: String, message: String },

    /// Raised only by the construction-time liveness check.
    #[error(
        "Authentication failed.\n  1. Get a key from https://aistudio.google.com/apikey\n  2. export GEMINI_API_KEY=<your-key>\n  3. Make sure you're NOT using a Google Cloud Console key.\n  ({0})"
    )]
    PreflightAuthentication(String),

    #[error(
        "Authentication failed. Make sure you're using a Gemini API key from https://aistudio.google.com/apikey (not a Google Cloud key). ({0})"
    )]
    Authentication(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Max retries exceeded for model call after {0} attempts")]
    MaxRetriesExceeded(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}

pub type Result<T> = std::result::Result<T, AstroError>;
