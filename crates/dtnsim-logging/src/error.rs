//! Logging setup errors

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("cannot access log path {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid logging config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid log filter '{directives}': {reason}")]
    Filter { directives: String, reason: String },

    #[error("a global tracing subscriber is already set")]
    AlreadyInitialized,
}
