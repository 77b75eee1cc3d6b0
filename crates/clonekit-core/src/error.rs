use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClonekitError {
    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("invalid run folder '{0}': must be letters, digits, hyphens and underscores")]
    InvalidFolder(String),

    #[error("invalid log file name: {0}")]
    InvalidLogName(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid platform '{0}': expected ios or android")]
    InvalidPlatform(String),

    #[error("platform unknown for run '{0}': cannot launch pipeline")]
    UnknownPlatform(String),

    #[error("pipeline already running for '{0}'")]
    RunActive(String),

    #[error("staged binary not found: {0}")]
    BinaryNotFound(String),

    #[error("no log recorded for run '{0}'")]
    LogNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClonekitError>;
