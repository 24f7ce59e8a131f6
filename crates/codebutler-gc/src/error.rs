use thiserror::Error;

#[derive(Debug, Error)]
pub enum GcError {
    /// A thread/PR/phase query failed. Probe failures never trigger
    /// destructive action; the affected branch is skipped for the pass.
    #[error("Probe failed: {0}")]
    Probe(String),

    #[error(transparent)]
    Worktree(#[from] codebutler_worktree::WorktreeError),

    #[error(transparent)]
    Mapping(#[from] codebutler_mappings::MappingError),

    #[error("Chat error: {0}")]
    Chat(#[from] codebutler_chat::ChatError),
}

pub type Result<T> = std::result::Result<T, GcError>;
