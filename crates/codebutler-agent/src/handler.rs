//! The per-message handler installed into the thread registry.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use codebutler_chat::Outbox;
use codebutler_core::clock::Clock;
use codebutler_core::types::ThreadMessage;
use codebutler_dispatch::{HandlerError, MessageHandler};
use codebutler_mappings::MappingStore;
use codebutler_prompt::PromptCache;
use codebutler_worktree::WorktreeManager;

use crate::executor::Executor;
use crate::workspace::WorkspaceHandle;

/// Pulls the current system prompt, runs the executor, and posts the reply
/// back into the thread through the outbox.
pub struct AgentHandler {
    prompt: Arc<PromptCache>,
    executor: Arc<dyn Executor>,
    outbox: Arc<Outbox>,
    manager: Arc<WorktreeManager>,
    store: Arc<dyn MappingStore>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl AgentHandler {
    pub fn new(
        prompt: Arc<PromptCache>,
        executor: Arc<dyn Executor>,
        outbox: Arc<Outbox>,
        manager: Arc<WorktreeManager>,
        store: Arc<dyn MappingStore>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            prompt,
            executor,
            outbox,
            manager,
            store,
            clock,
            cancel,
        }
    }
}

#[async_trait]
impl MessageHandler for AgentHandler {
    async fn handle(&self, msg: ThreadMessage) -> Result<(), HandlerError> {
        debug!(thread_id = %msg.thread_id, message_id = %msg.message_id, "handling message");

        let system_prompt = self.prompt.get()?;

        let workspace = WorkspaceHandle::new(
            Arc::clone(&self.manager),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            &msg.channel_id,
            &msg.thread_id,
        );

        let reply = self
            .executor
            .run(&system_prompt, &msg, &workspace, &self.cancel)
            .await?;

        if reply.trim().is_empty() {
            debug!(thread_id = %msg.thread_id, "executor produced no reply");
            return Ok(());
        }

        if let Err(e) = self
            .outbox
            .say(&msg.channel_id, Some(&msg.thread_id), &reply)
            .await
        {
            // Transient transport failure: the worker keeps draining; the
            // platform will retry the conversation, not us.
            warn!(thread_id = %msg.thread_id, error = %e, "failed to post reply");
        }
        Ok(())
    }
}
