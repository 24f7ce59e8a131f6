//! Workspace capability handed to the executor.
//!
//! The executor never touches the worktree manager or the mapping store
//! directly; provisioning goes through this handle so the branch slug, the
//! platform init step, and the mapping insert always happen together.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use codebutler_core::clock::Clock;
use codebutler_core::types::WorktreeMapping;
use codebutler_mappings::MappingStore;
use codebutler_worktree::{slug, WorktreeManager};

use crate::error::Result;

pub struct WorkspaceHandle {
    manager: Arc<WorktreeManager>,
    store: Arc<dyn MappingStore>,
    clock: Arc<dyn Clock>,
    channel_id: String,
    thread_id: String,
}

impl WorkspaceHandle {
    pub fn new(
        manager: Arc<WorktreeManager>,
        store: Arc<dyn MappingStore>,
        clock: Arc<dyn Clock>,
        channel_id: &str,
        thread_id: &str,
    ) -> Self {
        Self {
            manager,
            store,
            clock,
            channel_id: channel_id.to_string(),
            thread_id: thread_id.to_string(),
        }
    }

    /// Branch name a description would provision as, without provisioning.
    pub fn branch_for(&self, description: &str) -> String {
        slug::branch_for(description)
    }

    /// Create (or reuse) the worktree for `description`, run platform init,
    /// and bind the branch to this thread. Returns the worktree path.
    pub async fn provision(
        &self,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let branch = slug::branch_for(description);
        let path = self.manager.create(&branch, cancel).await?;
        self.manager.init(&branch, cancel).await?;
        self.store.insert(&WorktreeMapping {
            branch: branch.clone(),
            channel_id: self.channel_id.clone(),
            thread_id: self.thread_id.clone(),
            created_at: self.clock.now(),
        })?;
        info!(branch, path = %path.display(), "workspace provisioned");
        Ok(path)
    }

    /// Whether this thread already has a provisioned branch.
    pub fn existing_branch(&self) -> Result<Option<String>> {
        let found = self
            .store
            .list_mappings()?
            .into_iter()
            .find(|m| m.channel_id == self.channel_id && m.thread_id == self.thread_id)
            .map(|m| m.branch);
        Ok(found)
    }
}
