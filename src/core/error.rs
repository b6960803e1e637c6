//! Error types for repoctx

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using repoctx's Error
pub type Result<T> = std::result::Result<T, Error>;

/// repoctx error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not a git repository (or any parent up to filesystem root): {path}")]
    RepoMissing { path: PathBuf },

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Indexing cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
