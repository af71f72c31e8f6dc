use thiserror::Error;

/// Main error type for the fleet supervisor
#[derive(Error, Debug)]
pub enum RigwatchError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    Validation(String),

    // Lifecycle errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Collaborator errors
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RigwatchError
pub type Result<T> = std::result::Result<T, RigwatchError>;

/// Failures reported by a managed device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("client unreachable: {0}")]
    Unreachable(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}
