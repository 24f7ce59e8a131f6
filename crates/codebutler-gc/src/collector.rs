//! The periodic garbage collector.
//!
//! A branch is orphaned only when three independent signals all agree: the
//! thread has been idle past the inactivity timeout, the phase is not
//! `coding`, and no open PR references the branch. Orphans get a warning in
//! their thread first; cleanup happens a full grace period later, and any
//! recovered activity in between resets the clock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use codebutler_chat::Outbox;
use codebutler_core::clock::Clock;
use codebutler_core::config::GcSettings;
use codebutler_core::types::{ThreadPhase, WorktreeMapping};
use codebutler_mappings::MappingStore;
use codebutler_worktree::WorktreeManager;

use crate::error::Result;
use crate::probes::ThreadProbes;

/// What one pass did, for the log line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub examined: usize,
    pub stale_mappings: usize,
    pub warned: usize,
    pub removed: usize,
    pub skipped: usize,
}

pub struct GarbageCollector {
    manager: Arc<WorktreeManager>,
    store: Arc<dyn MappingStore>,
    probes: Arc<dyn ThreadProbes>,
    outbox: Arc<Outbox>,
    clock: Arc<dyn Clock>,
    settings: GcSettings,
    /// Branch → first-warning timestamp. In-memory only: a restart forgives
    /// previous warnings, which errs on the side of keeping worktrees.
    warned_at: tokio::sync::Mutex<HashMap<String, DateTime<Utc>>>,
}

impl GarbageCollector {
    pub fn new(
        manager: Arc<WorktreeManager>,
        store: Arc<dyn MappingStore>,
        probes: Arc<dyn ThreadProbes>,
        outbox: Arc<Outbox>,
        clock: Arc<dyn Clock>,
        settings: GcSettings,
    ) -> Self {
        Self {
            manager,
            store,
            probes,
            outbox,
            clock,
            settings,
            warned_at: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Periodic driver. Runs until the token is cancelled; a failed pass is
    /// logged and retried at the next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately; skip the startup tick so recovery has
        // first claim on the worktree set.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("gc loop cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    match self.run_pass(&cancel).await {
                        Ok(summary) => info!(?summary, "gc pass complete"),
                        Err(e) => error!(error = %e, "gc pass failed"),
                    }
                }
            }
        }
    }

    /// One collection pass. Holds the GC mutex, so passes never overlap.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassSummary> {
        let mut warned_at = self.warned_at.lock().await;
        let mut summary = PassSummary::default();
        let now = self.clock.now();

        for mapping in self.store.list_mappings()? {
            if cancel.is_cancelled() {
                break;
            }
            summary.examined += 1;
            let branch = mapping.branch.clone();

            // Mapping without a worktree: the tree is already gone, drop the
            // bookkeeping.
            if !self.manager.exists(&branch) {
                debug!(branch, "mapping without worktree, pruning");
                self.store.remove_mapping(&branch)?;
                warned_at.remove(&branch);
                summary.stale_mappings += 1;
                continue;
            }

            let orphaned = match self.is_orphaned(&mapping, now).await {
                Ok(orphaned) => orphaned,
                Err(e) => {
                    warn!(branch, error = %e, "probe failed, skipping branch this pass");
                    summary.skipped += 1;
                    continue;
                }
            };

            if !orphaned {
                if warned_at.remove(&branch).is_some() {
                    info!(branch, "activity recovered, warning cleared");
                }
                continue;
            }

            match warned_at.get(&branch).copied() {
                None => {
                    self.send_warning(&mapping).await;
                    warned_at.insert(branch, now);
                    summary.warned += 1;
                }
                Some(warned) if now - warned < self.settings.grace_period() => {
                    debug!(branch, "orphaned, inside grace period");
                }
                Some(_) => {
                    info!(branch, "grace period elapsed, cleaning up");
                    if let Err(e) = self
                        .manager
                        .remove(&branch, self.settings.delete_remote_on_cleanup, cancel)
                        .await
                    {
                        // Try again next pass; the warning stays armed.
                        error!(branch, error = %e, "worktree removal failed");
                        summary.skipped += 1;
                        continue;
                    }
                    self.store.remove_mapping(&branch)?;
                    warned_at.remove(&branch);
                    summary.removed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Orphan verdict: all three probes must affirm. Any probe error aborts
    /// the verdict for this branch; uncertainty never destroys data.
    async fn is_orphaned(&self, mapping: &WorktreeMapping, now: DateTime<Utc>) -> Result<bool> {
        let last = self
            .probes
            .last_activity(&mapping.channel_id, &mapping.thread_id)
            .await?;
        // Unknown last-activity counts as inactive: a thread the platform
        // cannot date has been quiet longer than we can see.
        let inactive = match last {
            Some(at) => now - at >= self.settings.inactivity_timeout(),
            None => true,
        };
        if !inactive {
            return Ok(false);
        }

        let phase = self
            .probes
            .get_phase(&mapping.channel_id, &mapping.thread_id)
            .await?;
        if phase == ThreadPhase::Coding {
            return Ok(false);
        }

        let has_pr = self.probes.has_open_pr(&mapping.branch).await?;
        Ok(!has_pr)
    }

    async fn send_warning(&self, mapping: &WorktreeMapping) {
        let hours = self.settings.grace_period_secs / 3600;
        let text = format!(
            "This thread's branch `{}` looks abandoned (no recent activity, \
             no open PR). Its worktree will be cleaned up in {hours}h unless \
             the conversation resumes.",
            mapping.branch
        );
        if let Err(e) = self
            .outbox
            .say(&mapping.channel_id, Some(&mapping.thread_id), &text)
            .await
        {
            // A lost warning is recoverable: the branch stays warned and the
            // grace period still applies.
            warn!(branch = %mapping.branch, error = %e, "failed to post gc warning");
        }
    }
}
