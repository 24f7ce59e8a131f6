use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Core(#[from] codebutler_core::ButlerError),

    #[error(transparent)]
    Chat(#[from] codebutler_chat::ChatError),

    #[error(transparent)]
    Prompt(#[from] codebutler_prompt::PromptError),

    #[error(transparent)]
    Worktree(#[from] codebutler_worktree::WorktreeError),

    #[error(transparent)]
    Mapping(#[from] codebutler_mappings::MappingError),

    #[error(transparent)]
    Gc(#[from] codebutler_gc::GcError),

    #[error("Executor error: {0}")]
    Executor(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
