//! Worktree lifecycle operations.
//!
//! All managed worktrees live under the branches directory, one per branch,
//! at `<base>/<branch>`. Creation is idempotent; removal is best-effort with
//! a manual-cleanup fallback so a half-removed tree cannot wedge the
//! collector.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, WorktreeError};
use crate::init;
use crate::runner::CommandRunner;

/// One managed worktree as reported by the VCS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: String,
}

pub struct WorktreeManager {
    repo_root: PathBuf,
    base_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl WorktreeManager {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            base_dir: base_dir.into(),
            runner,
        }
    }

    /// Filesystem home of a branch's worktree.
    pub fn path_for(&self, branch: &str) -> PathBuf {
        self.base_dir.join(branch)
    }

    /// Fast existence check; a stat, no VCS involvement.
    pub fn exists(&self, branch: &str) -> bool {
        self.path_for(branch).is_dir()
    }

    /// Create the worktree for `branch`, returning its path.
    ///
    /// Idempotent: an existing tree is returned as-is. A fresh branch is
    /// created first; when the branch already exists the add is retried
    /// against it.
    pub async fn create(&self, branch: &str, cancel: &CancellationToken) -> Result<PathBuf> {
        let path = self.path_for(branch);
        if path.is_dir() {
            debug!(branch, "worktree already present");
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.base_dir).await?;
        let path_str = path.display().to_string();

        let fresh = self
            .git(&["worktree", "add", "-b", branch, &path_str], cancel)
            .await?;
        if fresh.status_ok {
            info!(branch, path = %path.display(), "worktree created on new branch");
            return Ok(path);
        }

        // The branch may already exist (e.g. re-provisioning after a crash);
        // attach a worktree to it instead.
        let existing = self
            .git(&["worktree", "add", &path_str, branch], cancel)
            .await?;
        if existing.status_ok {
            info!(branch, path = %path.display(), "worktree created on existing branch");
            return Ok(path);
        }

        Err(WorktreeError::Git {
            context: format!("worktree add {branch}"),
            stderr: format!(
                "new-branch attempt: {}; existing-branch attempt: {}",
                fresh.stderr.trim(),
                existing.stderr.trim()
            ),
        })
    }

    /// Run per-platform initialization inside the worktree.
    pub async fn init(&self, branch: &str, cancel: &CancellationToken) -> Result<()> {
        let path = self.path_for(branch);
        init::run(self.runner.as_ref(), &path, cancel).await
    }

    /// Remove the worktree, its local branch, and optionally the remote
    /// branch. Idempotent and best-effort: a tree the VCS no longer knows
    /// about is cleaned up manually and its metadata pruned.
    pub async fn remove(
        &self,
        branch: &str,
        delete_remote: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let path = self.path_for(branch);
        let path_str = path.display().to_string();

        let removed = self
            .git(&["worktree", "remove", "--force", &path_str], cancel)
            .await?;
        if !removed.status_ok {
            warn!(
                branch,
                stderr = %removed.stderr.trim(),
                "worktree remove failed, falling back to manual cleanup"
            );
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(WorktreeError::Io(e)),
            }
            let pruned = self.git(&["worktree", "prune"], cancel).await?;
            if !pruned.status_ok {
                warn!(branch, stderr = %pruned.stderr.trim(), "worktree prune failed");
            }
        }

        let branch_deleted = self.git(&["branch", "-D", branch], cancel).await?;
        if !branch_deleted.status_ok {
            // Branch may never have existed locally; not fatal.
            debug!(branch, stderr = %branch_deleted.stderr.trim(), "local branch delete failed");
        }

        if delete_remote {
            let pushed = self
                .git(&["push", "origin", "--delete", branch], cancel)
                .await?;
            if !pushed.status_ok {
                // The remote branch may never have been pushed.
                warn!(branch, stderr = %pushed.stderr.trim(), "remote branch delete failed");
            }
        }

        info!(branch, "worktree removed");
        Ok(())
    }

    /// Every managed worktree, from the VCS's porcelain listing, filtered to
    /// trees under our base directory.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<WorktreeInfo>> {
        let output = self
            .git(&["worktree", "list", "--porcelain"], cancel)
            .await?;
        if !output.status_ok {
            return Err(WorktreeError::Git {
                context: "worktree list".to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(parse_porcelain(&output.stdout)
            .into_iter()
            .filter(|info| info.path.starts_with(&self.base_dir))
            .collect())
    }

    async fn git(
        &self,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<crate::runner::CmdOutput> {
        self.runner.run("git", args, &self.repo_root, cancel).await
    }
}

/// Parse `git worktree list --porcelain` blocks into (path, branch) entries.
/// Detached or branchless entries (the main checkout during a rebase, bare
/// repos) are skipped.
fn parse_porcelain(stdout: &str) -> Vec<WorktreeInfo> {
    let mut entries = Vec::new();
    let mut current_path: Option<PathBuf> = None;

    for line in stdout.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            current_path = Some(PathBuf::from(path.trim()));
        } else if let Some(branch) = line.strip_prefix("branch ") {
            let branch = branch
                .trim()
                .strip_prefix("refs/heads/")
                .unwrap_or(branch.trim())
                .to_string();
            if let Some(path) = current_path.take() {
                entries.push(WorktreeInfo { path, branch });
            }
        } else if line.is_empty() {
            current_path = None;
        }
    }
    entries
}
