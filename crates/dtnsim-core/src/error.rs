//! Error types for the simulator
//!
//! Configuration problems and invariant violations are the only errors;
//! admission refusals travel as plain receive codes.

use std::path::PathBuf;

use thiserror::Error;

use crate::ids::{ConnectionId, HostId};

/// Errors raised while reading or validating settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("Missing setting '{key}'")]
    MissingSetting { key: String },

    /// A setting exists but cannot be interpreted
    #[error("Invalid value '{value}' for setting '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A setting that must be non-negative is negative
    #[error("Negative value {value} for setting '{key}'")]
    NegativeValue { key: String, value: f64 },

    /// A class name does not resolve in the registry
    #[error("Unknown {kind} '{name}'")]
    UnknownClass { kind: &'static str, name: String },

    /// A settings or location file could not be read
    #[error("Cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A settings line is malformed
    #[error("Malformed settings line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Errors that abort a simulation run
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration error surfaced while building or running
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A transfer completed for a message the receiver never admitted
    #[error("No message '{id}' in the incoming buffer of {host}")]
    NotInIncoming { host: HostId, id: String },

    /// A handle does not name a host
    #[error("Unknown host {0}")]
    UnknownHost(HostId),

    /// A handle does not name a connection
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// A router was needed while checked out of the router table
    #[error("Router of {0} is not available")]
    RouterUnavailable(HostId),

    /// A transfer was started on a connection that already carries one
    #[error("Connection {0} already carries a message")]
    ConnectionBusy(ConnectionId),

    /// Any other broken invariant
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

/// Result type for configuration lookups
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;
