//! The assembled-prompt cache.
//!
//! `get` is cheap on the hot path: a read lock plus an mtime sweep over the
//! watched files. Only when a watched file's presence or mtime has changed
//! does it take the write lock and rebuild (double-checked, so concurrent
//! callers rebuild once).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use codebutler_core::types::Role;

use crate::error::Result;
use crate::seeds;
use crate::skills;

pub const PART_SEPARATOR: &str = "\n\n---\n\n";

/// `None` records a file that was absent at snapshot time; its later
/// appearance invalidates the cache just like an edit would.
type MtimeSnapshot = HashMap<PathBuf, Option<SystemTime>>;

struct CacheState {
    prompt: String,
    mtimes: MtimeSnapshot,
}

pub struct PromptCache {
    seeds_dir: PathBuf,
    skills_dir: PathBuf,
    role: Role,
    state: RwLock<Option<CacheState>>,
}

impl PromptCache {
    pub fn new(seeds_dir: impl Into<PathBuf>, skills_dir: impl Into<PathBuf>, role: Role) -> Self {
        Self {
            seeds_dir: seeds_dir.into(),
            skills_dir: skills_dir.into(),
            role,
            state: RwLock::new(None),
        }
    }

    /// Current system prompt, rebuilt only when a watched file changed.
    ///
    /// Deterministic: identical file contents produce byte-identical output.
    pub fn get(&self) -> Result<String> {
        {
            let state = self.state.read().unwrap();
            if let Some(cached) = state.as_ref() {
                if !snapshot_stale(&cached.mtimes) {
                    return Ok(cached.prompt.clone());
                }
            }
        }

        let mut state = self.state.write().unwrap();
        // Double-checked: another caller may have rebuilt while we waited.
        if let Some(cached) = state.as_ref() {
            if !snapshot_stale(&cached.mtimes) {
                return Ok(cached.prompt.clone());
            }
        }

        let (prompt, mtimes) = self.rebuild()?;
        info!(role = %self.role, watched = mtimes.len(), "system prompt rebuilt");
        let result = prompt.clone();
        *state = Some(CacheState { prompt, mtimes });
        Ok(result)
    }

    /// Drop the cached prompt and mtime snapshot entirely.
    pub fn invalidate(&self) {
        debug!(role = %self.role, "prompt cache invalidated");
        *self.state.write().unwrap() = None;
    }

    fn rebuild(&self) -> Result<(String, MtimeSnapshot)> {
        let role_seed_path = self.seeds_dir.join(format!("{}.md", self.role));
        let global_path = self.seeds_dir.join("global.md");
        let workflows_path = self.seeds_dir.join("workflows.md");

        let mut mtimes = MtimeSnapshot::new();
        let mut parts: Vec<String> = Vec::new();

        let role_seed = seeds::load_required(&role_seed_path)?;
        record(&mut mtimes, &role_seed_path);
        parts.push(role_seed);

        let global = seeds::load_required(&global_path)?;
        record(&mut mtimes, &global_path);
        parts.push(global);

        if self.role == Role::Pm {
            match seeds::load_optional(&workflows_path)? {
                Some(workflows) => parts.push(workflows),
                None => warn!(path = %workflows_path.display(), "workflows seed absent"),
            }
            record(&mut mtimes, &workflows_path);

            // A failed scan is non-fatal: the prompt simply ships without
            // the skill index this round.
            match skills::scan_skills(&self.skills_dir) {
                Ok(entries) => {
                    for (path, _) in &entries {
                        record(&mut mtimes, path);
                    }
                    let parsed: Vec<_> =
                        entries.into_iter().map(|(_, skill)| skill).collect();
                    if let Some(index) = skills::render_index(&parsed) {
                        parts.push(index);
                    }
                }
                Err(e) => {
                    warn!(
                        dir = %self.skills_dir.display(),
                        error = %e,
                        "skill scan failed, building prompt without skill index"
                    );
                }
            }
        }

        let prompt = parts
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(PART_SEPARATOR);

        Ok((prompt, mtimes))
    }
}

fn record(mtimes: &mut MtimeSnapshot, path: &Path) {
    let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
    mtimes.insert(path.to_path_buf(), mtime);
}

/// True when any watched file's presence or mtime differs from the snapshot.
fn snapshot_stale(mtimes: &MtimeSnapshot) -> bool {
    mtimes.iter().any(|(path, recorded)| {
        let current = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        current != *recorded
    })
}
