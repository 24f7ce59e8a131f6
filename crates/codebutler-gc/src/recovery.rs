//! Startup reconciliation of local worktrees against live threads.
//!
//! Runs once, before normal dispatch starts. Only the unambiguous case is
//! destructive: a mapped worktree whose thread is verifiably gone. Unmapped
//! trees and uncertain probes are left for the garbage collector, which has
//! warnings and a grace period on its side.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use codebutler_core::clock::Clock;
use codebutler_core::types::Role;
use codebutler_mappings::MappingStore;
use codebutler_worktree::WorktreeManager;

use crate::error::Result;
use crate::probes::ThreadProbes;

/// An active thread that survived reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveThread {
    pub branch: String,
    pub thread_id: String,
    /// Whether the executor has persisted conversation state for the thread.
    pub has_conversation: bool,
}

/// Outcome of the startup pass. Logged, never persisted.
#[derive(Debug, Clone)]
pub struct RecoveryReport {
    pub role: Role,
    pub started_at: DateTime<Utc>,
    pub active: Vec<ActiveThread>,
    /// Worktrees with no mapping: counted and left for the GC.
    pub orphaned: Vec<String>,
    /// Worktrees whose thread is gone: removed together with their mapping.
    pub removed: Vec<String>,
}

pub async fn reconcile(
    role: Role,
    manager: &WorktreeManager,
    store: &dyn MappingStore,
    probes: &dyn ThreadProbes,
    clock: &Arc<dyn Clock>,
    cancel: &CancellationToken,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport {
        role,
        started_at: clock.now(),
        active: Vec::new(),
        orphaned: Vec::new(),
        removed: Vec::new(),
    };

    for worktree in manager.list(cancel).await? {
        let branch = worktree.branch.clone();

        let mapping = match store.get(&branch)? {
            Some(mapping) => mapping,
            None => {
                info!(branch, "worktree has no mapping, leaving for gc");
                report.orphaned.push(branch);
                continue;
            }
        };

        let active = match probes
            .is_thread_active(&mapping.channel_id, &mapping.thread_id)
            .await
        {
            Ok(active) => active,
            Err(e) => {
                warn!(branch, error = %e, "thread probe failed, leaving worktree alone");
                continue;
            }
        };

        if !active {
            info!(branch, thread_id = %mapping.thread_id, "thread gone, removing worktree");
            if let Err(e) = manager.remove(&branch, false, cancel).await {
                warn!(branch, error = %e, "removal failed, leaving for gc");
                continue;
            }
            store.remove_mapping(&branch)?;
            report.removed.push(branch);
            continue;
        }

        let has_conversation = probes
            .has_conversation(&mapping.channel_id, &mapping.thread_id)
            .await
            .unwrap_or(false);
        report.active.push(ActiveThread {
            branch,
            thread_id: mapping.thread_id,
            has_conversation,
        });
    }

    info!(
        role = %report.role,
        active = report.active.len(),
        orphaned = report.orphaned.len(),
        removed = report.removed.len(),
        "startup reconciliation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codebutler_core::clock::SystemClock;
    use codebutler_core::types::{ThreadPhase, WorktreeMapping};
    use codebutler_mappings::SqliteMappingStore;
    use codebutler_worktree::{CmdOutput, CommandRunner};
    use std::collections::HashSet;
    use std::path::Path;

    /// Runner that serves a canned porcelain listing and records removals.
    struct ListingRunner {
        porcelain: String,
        removed: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for ListingRunner {
        async fn run(
            &self,
            _program: &str,
            args: &[&str],
            _dir: &Path,
            _cancel: &CancellationToken,
        ) -> codebutler_worktree::Result<CmdOutput> {
            if args.first() == Some(&"worktree") && args.get(1) == Some(&"list") {
                return Ok(CmdOutput {
                    status_ok: true,
                    stdout: self.porcelain.clone(),
                    stderr: String::new(),
                });
            }
            if args.first() == Some(&"worktree") && args.get(1) == Some(&"remove") {
                self.removed
                    .lock()
                    .unwrap()
                    .push(args.last().unwrap().to_string());
            }
            Ok(CmdOutput {
                status_ok: true,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    struct SetProbes {
        active_threads: HashSet<String>,
        fail_threads: HashSet<String>,
    }

    #[async_trait]
    impl ThreadProbes for SetProbes {
        async fn last_activity(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<DateTime<Utc>>> {
            Ok(None)
        }
        async fn is_thread_active(&self, _: &str, thread: &str) -> Result<bool> {
            if self.fail_threads.contains(thread) {
                return Err(crate::error::GcError::Probe("flaky".into()));
            }
            Ok(self.active_threads.contains(thread))
        }
        async fn has_conversation(&self, _: &str, thread: &str) -> Result<bool> {
            Ok(self.active_threads.contains(thread))
        }
        async fn has_open_pr(&self, _: &str) -> Result<bool> {
            Ok(false)
        }
        async fn get_phase(&self, _: &str, _: &str) -> Result<ThreadPhase> {
            Ok(ThreadPhase::Unknown)
        }
    }

    fn porcelain_for(base: &Path, branches: &[&str]) -> String {
        branches
            .iter()
            .map(|b| {
                format!(
                    "worktree {}\nHEAD 0000\nbranch refs/heads/{b}\n\n",
                    base.join(b).display()
                )
            })
            .collect()
    }

    fn mapping(branch: &str, thread_id: &str) -> WorktreeMapping {
        WorktreeMapping {
            branch: branch.to_string(),
            channel_id: "C1".to_string(),
            thread_id: thread_id.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn reconcile_sorts_worktrees_into_three_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join(".codebutler/branches");
        let runner = Arc::new(ListingRunner {
            porcelain: porcelain_for(
                &base,
                &[
                    "codebutler/active",
                    "codebutler/gone",
                    "codebutler/orphan",
                ],
            ),
            removed: std::sync::Mutex::new(Vec::new()),
        });
        let manager = WorktreeManager::new(dir.path(), &base, runner.clone());

        let store = SqliteMappingStore::open_in_memory().unwrap();
        store.insert(&mapping("codebutler/active", "T-active")).unwrap();
        store.insert(&mapping("codebutler/gone", "T-gone")).unwrap();

        let probes = SetProbes {
            active_threads: HashSet::from(["T-active".to_string()]),
            fail_threads: HashSet::new(),
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let report = reconcile(
            Role::Coder,
            &manager,
            &store,
            &probes,
            &clock,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.removed, vec!["codebutler/gone"]);
        assert_eq!(report.orphaned, vec!["codebutler/orphan"]);
        assert_eq!(report.active.len(), 1);
        assert_eq!(report.active[0].branch, "codebutler/active");
        assert!(report.active[0].has_conversation);

        // `gone` lost its mapping; `active` kept it; `orphan` never had one.
        assert!(store.get("codebutler/gone").unwrap().is_none());
        assert!(store.get("codebutler/active").unwrap().is_some());
        assert_eq!(runner.removed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn probe_failure_leaves_the_worktree_alone() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join(".codebutler/branches");
        let runner = Arc::new(ListingRunner {
            porcelain: porcelain_for(&base, &["codebutler/flaky"]),
            removed: std::sync::Mutex::new(Vec::new()),
        });
        let manager = WorktreeManager::new(dir.path(), &base, runner.clone());

        let store = SqliteMappingStore::open_in_memory().unwrap();
        store.insert(&mapping("codebutler/flaky", "T-flaky")).unwrap();

        let probes = SetProbes {
            active_threads: HashSet::new(),
            fail_threads: HashSet::from(["T-flaky".to_string()]),
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let report = reconcile(
            Role::Coder,
            &manager,
            &store,
            &probes,
            &clock,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(report.removed.is_empty());
        assert!(report.active.is_empty());
        assert!(store.get("codebutler/flaky").unwrap().is_some());
        assert!(runner.removed.lock().unwrap().is_empty());
    }
}
