//! Repository-anchored filesystem layout.
//!
//! Everything CodeButler writes lives under `<repo>/.codebutler/`. Managed
//! worktrees are nested one level deeper, `branches/codebutler/<slug>`.

use std::path::{Path, PathBuf};

use crate::types::Role;

pub const DOT_DIR: &str = ".codebutler";

#[derive(Debug, Clone)]
pub struct ButlerPaths {
    repo_root: PathBuf,
}

impl ButlerPaths {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn dot_dir(&self) -> PathBuf {
        self.repo_root.join(DOT_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.dot_dir().join("config.json")
    }

    /// Optional external tool-server list consumed by the executor.
    pub fn mcp_file(&self) -> PathBuf {
        self.dot_dir().join("mcp.json")
    }

    pub fn roadmap_file(&self) -> PathBuf {
        self.dot_dir().join("roadmap.md")
    }

    pub fn seed_file(&self, role: Role) -> PathBuf {
        self.dot_dir().join(format!("{}.md", role))
    }

    pub fn global_seed(&self) -> PathBuf {
        self.dot_dir().join("global.md")
    }

    pub fn workflows_seed(&self) -> PathBuf {
        self.dot_dir().join("workflows.md")
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.dot_dir().join("skills")
    }

    pub fn branches_dir(&self) -> PathBuf {
        self.dot_dir().join("branches")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dot_dir().join("images")
    }

    pub fn research_dir(&self) -> PathBuf {
        self.dot_dir().join("research")
    }

    pub fn mappings_db(&self) -> PathBuf {
        self.dot_dir().join("mappings.db")
    }
}

/// Process-wide config shared by every repository, `~/.codebutler/config.json`.
pub fn home_config_file() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(DOT_DIR).join("config.json")
}
