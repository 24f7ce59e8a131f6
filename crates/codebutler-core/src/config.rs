use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ButlerError, Result};
use crate::paths::home_config_file;

/// Top-level config (`.codebutler/config.json` + `CODEBUTLER_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ButlerConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub gc: GcSettings,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Per-agent runtime knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Seconds a thread worker may sit idle before it self-terminates.
    #[serde(default = "default_worker_idle_secs")]
    pub inactivity_timeout_secs: u64,

    /// Bound on each worker's inbound queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: default_worker_idle_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AgentConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}

/// Event deduplication window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_dedup_max_entries")]
    pub max_entries: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dedup_ttl_secs(),
            max_entries: default_dedup_max_entries(),
        }
    }
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Orphaned-worktree collection cadence and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcSettings {
    /// Seconds between GC passes.
    #[serde(default = "default_gc_interval_secs")]
    pub interval_secs: u64,

    /// Thread idle time before a branch counts as inactive.
    #[serde(default = "default_gc_inactivity_secs")]
    pub inactivity_timeout_secs: u64,

    /// Delay between the orphan warning and destructive cleanup.
    #[serde(default = "default_gc_grace_secs")]
    pub grace_period_secs: u64,

    /// Also delete the remote branch when cleaning up.
    #[serde(default = "bool_true")]
    pub delete_remote_on_cleanup: bool,
}

impl Default for GcSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_gc_interval_secs(),
            inactivity_timeout_secs: default_gc_inactivity_secs(),
            grace_period_secs: default_gc_grace_secs(),
            delete_remote_on_cleanup: true,
        }
    }
}

impl GcSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn inactivity_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.inactivity_timeout_secs as i64)
    }

    pub fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.grace_period_secs as i64)
    }
}

/// Opaque credentials handed to the injected chat transport.
///
/// The core never interprets these; the transport chooses its own
/// authentication.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatConfig {
    pub token: Option<String>,
    pub app_token: Option<String>,
}

/// Where seeds and skills live. Empty means the `.codebutler/` defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptConfig {
    pub seeds_dir: Option<String>,
    pub skills_dir: Option<String>,
}

fn default_worker_idle_secs() -> u64 {
    1800 // 30 minutes
}
fn default_queue_capacity() -> usize {
    64
}
fn default_dedup_ttl_secs() -> u64 {
    300 // 5 minutes
}
fn default_dedup_max_entries() -> usize {
    10_000
}
fn default_gc_interval_secs() -> u64 {
    6 * 60 * 60
}
fn default_gc_inactivity_secs() -> u64 {
    48 * 60 * 60
}
fn default_gc_grace_secs() -> u64 {
    24 * 60 * 60
}
fn bool_true() -> bool {
    true
}

impl ButlerConfig {
    /// Load config for a repository.
    ///
    /// Merge order (later wins):
    ///   1. ~/.codebutler/config.json   (process-wide tokens)
    ///   2. <repo>/.codebutler/config.json, or `explicit_path` when given
    ///   3. CODEBUTLER_* env vars (`__` separates nesting, e.g.
    ///      CODEBUTLER_GC__GRACE_PERIOD_SECS)
    ///
    /// A missing repo-scoped file is a fail-fast error; an agent must never
    /// serve a repository that was not set up for it.
    pub fn load(repo_config: &Path, explicit_path: Option<&Path>) -> Result<Self> {
        let repo_file = explicit_path.unwrap_or(repo_config);
        if !repo_file.is_file() {
            return Err(ButlerError::Config(format!(
                "config not found at {} (run the setup wizard first)",
                repo_file.display()
            )));
        }

        let config: ButlerConfig = Figment::new()
            .merge(Json::file(home_config_file()))
            .merge(Json::file(repo_file))
            .merge(Env::prefixed("CODEBUTLER_").split("__"))
            .extract()
            .map_err(|e| ButlerError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ButlerConfig::default();
        assert_eq!(config.dedup.ttl_secs, 300);
        assert_eq!(config.dedup.max_entries, 10_000);
        assert_eq!(config.gc.interval_secs, 6 * 60 * 60);
        assert_eq!(config.gc.inactivity_timeout_secs, 48 * 60 * 60);
        assert_eq!(config.gc.grace_period_secs, 24 * 60 * 60);
        assert!(config.gc.delete_remote_on_cleanup);
    }

    #[test]
    fn missing_repo_config_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let err = ButlerConfig::load(&dir.path().join("config.json"), None).unwrap_err();
        assert!(matches!(err, ButlerError::Config(_)));
    }

    #[test]
    fn repo_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, r#"{"gc": {"grace_period_secs": 60}}"#).unwrap();

        let config = ButlerConfig::load(&file, None).unwrap();
        assert_eq!(config.gc.grace_period_secs, 60);
        // untouched sections keep their defaults
        assert_eq!(config.dedup.ttl_secs, 300);
    }

    #[test]
    fn explicit_path_wins_over_repo_location() {
        let dir = tempfile::tempdir().unwrap();
        let alt = dir.path().join("alt.json");
        std::fs::write(&alt, r#"{"agent": {"queue_capacity": 8}}"#).unwrap();

        let config =
            ButlerConfig::load(&dir.path().join("missing.json"), Some(&alt)).unwrap();
        assert_eq!(config.agent.queue_capacity, 8);
    }
}
