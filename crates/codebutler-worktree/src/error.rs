use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorktreeError {
    /// A VCS command failed after every fallback path was tried. Carries the
    /// command's stderr so the operator sees what git saw.
    #[error("git {context} failed: {stderr}")]
    Git { context: String, stderr: String },

    #[error("Command `{program}` could not be run: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorktreeError>;
