use thiserror::Error;

#[derive(Debug, Error)]
pub enum ButlerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ButlerError>;
