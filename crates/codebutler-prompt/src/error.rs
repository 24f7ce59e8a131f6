use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Required seed file missing: {}", path.display())]
    MissingSeed { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PromptError>;
