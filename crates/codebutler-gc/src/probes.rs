use async_trait::async_trait;
use chrono::{DateTime, Utc};

use codebutler_core::types::ThreadPhase;

use crate::error::Result;

/// Injected thread/PR/phase query bundle.
///
/// Every destructive GC decision rests on these answers, so implementations
/// should prefer returning an error over guessing, since the collector treats an
/// indeterminate probe as a veto.
#[async_trait]
pub trait ThreadProbes: Send + Sync {
    /// Timestamp of the most recent message in the thread, `None` when the
    /// thread has no recorded activity.
    async fn last_activity(
        &self,
        channel: &str,
        thread: &str,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Whether the thread still exists and is reachable on the platform.
    async fn is_thread_active(&self, channel: &str, thread: &str) -> Result<bool>;

    /// Whether the thread has persisted conversation state with the
    /// executor. Informational; never used for destructive decisions.
    async fn has_conversation(&self, channel: &str, thread: &str) -> Result<bool>;

    /// Whether an open pull request exists for the branch.
    async fn has_open_pr(&self, branch: &str) -> Result<bool>;

    async fn get_phase(&self, channel: &str, thread: &str) -> Result<ThreadPhase>;
}
