//! Per-platform worktree initialization.
//!
//! A fresh worktree is a bare checkout; before an agent works in it the
//! platform's dependency step runs once. Detection probes marker files in
//! priority order; the first match wins and unknown platforms are a no-op.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::runner::CommandRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Go,
    Node,
    Python,
    Rust,
    Unknown,
}

/// Probe order is significant: a polyglot repo initializes as the first
/// platform that matches.
pub fn detect(dir: &Path) -> Platform {
    if dir.join("go.mod").is_file() {
        Platform::Go
    } else if dir.join("package.json").is_file() {
        Platform::Node
    } else if dir.join("requirements.txt").is_file() || dir.join("pyproject.toml").is_file() {
        Platform::Python
    } else if dir.join("Cargo.toml").is_file() {
        Platform::Rust
    } else {
        Platform::Unknown
    }
}

pub async fn run(
    runner: &dyn CommandRunner,
    worktree: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let platform = detect(worktree);
    info!(path = %worktree.display(), ?platform, "initializing worktree");

    match platform {
        // Go and Rust toolchains resolve dependencies on first build.
        Platform::Go | Platform::Rust | Platform::Unknown => Ok(()),
        Platform::Node => {
            let out = runner.run("npm", &["install"], worktree, cancel).await?;
            if !out.status_ok {
                warn!(stderr = %out.stderr.trim(), "npm install failed");
            }
            Ok(())
        }
        Platform::Python => {
            let venv = runner
                .run("python3", &["-m", "venv", ".venv"], worktree, cancel)
                .await?;
            if !venv.status_ok {
                warn!(stderr = %venv.stderr.trim(), "venv creation failed");
                return Ok(());
            }
            if worktree.join("requirements.txt").is_file() {
                let pip = runner
                    .run(
                        ".venv/bin/pip",
                        &["install", "-r", "requirements.txt"],
                        worktree,
                        cancel,
                    )
                    .await?;
                if !pip.status_ok {
                    warn!(stderr = %pip.stderr.trim(), "pip install failed");
                }
            }
            Ok(())
        }
    }
}
