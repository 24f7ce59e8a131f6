use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid redaction pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ChatError>;
