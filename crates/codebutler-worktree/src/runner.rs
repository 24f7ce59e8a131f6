//! Subprocess capability for VCS and platform-init commands.
//!
//! Injected so the manager's failure paths are testable without a real git
//! binary, and so every invocation honors the root cancellation token.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, WorktreeError};

#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub status_ok: bool,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program args…` inside `dir`, returning its captured output.
    ///
    /// A non-zero exit is NOT an error at this layer; callers decide which
    /// failures have fallbacks. `Err` means the command could not run at all
    /// or was cancelled.
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<CmdOutput>;
}

/// Real subprocess runner.
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<CmdOutput> {
        debug!(program, ?args, dir = %dir.display(), "running command");

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Inherited git environment would redirect worktree commands at
            // the wrong repository.
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .kill_on_drop(true);

        let child = cmd.output();
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(WorktreeError::Cancelled),
            output = child => output.map_err(|e| WorktreeError::Spawn {
                program: program.to_string(),
                reason: e.to_string(),
            })?,
        };

        Ok(CmdOutput {
            status_ok: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
