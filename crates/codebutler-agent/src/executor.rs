use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use codebutler_core::types::ThreadMessage;

use crate::error::Result;
use crate::workspace::WorkspaceHandle;

/// The injected LLM/tool runner.
///
/// The runtime hands it the assembled system prompt, the message, and a
/// workspace capability for provisioning a branch worktree; it returns the
/// reply text to post back into the thread. Implementations must honor the
/// cancellation token; shutdown will not wait past its deadline.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(
        &self,
        system_prompt: &str,
        msg: &ThreadMessage,
        workspace: &WorkspaceHandle,
        cancel: &CancellationToken,
    ) -> Result<String>;
}
