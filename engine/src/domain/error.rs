//! Domain-level errors
//! Supervisor-internal faults are captured into `ProcessStatus::Failed`; these
//! values carry the human-readable description

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    // Lifecycle errors
    #[error("Failed to spawn process '{process}': {reason}")]
    SpawnFailure { process: String, reason: String },

    #[error("Health check failed: {0}")]
    HealthCheckFailure(String),

    #[error("Process did not exit within {0}s of the shutdown request")]
    GracefulShutdownTimeout(u64),

    #[error("Process exited unexpectedly (exit code: {})", .0.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    UnexpectedProcessExit(Option<i32>),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Interceptor '{name}' rejected start: {reason}")]
    InterceptorRejected { name: String, reason: String },

    // Transport errors
    #[error("HTTP request to {uri} failed: {reason}")]
    Http { uri: String, reason: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
