use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A named shutdown step. The token it receives is cancelled when the
/// shutdown deadline expires, so long-running hooks can bail early.
type HookFn =
    Box<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;

struct ShutdownHook {
    name: String,
    run: HookFn,
}

/// Graceful shutdown window once a signal lands.
const GRACEFUL_DEADLINE: Duration = Duration::from_secs(10);
/// Hard wall clock: the process exits no matter what after this.
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(15);
/// Shorter window for hooks on a normal (non-signal) exit.
const QUICK_DEADLINE: Duration = Duration::from_secs(5);

/// Owns the root cancellable context and the ordered shutdown hooks.
///
/// On signal: mark shutdown in progress (idempotent), cancel the root token,
/// run hooks in registration order under the graceful deadline, with a
/// spawned force-exit backstop in case anything wedges.
pub struct LifecycleManager {
    root: CancellationToken,
    hooks: Mutex<Vec<ShutdownHook>>,
    shutting_down: AtomicBool,
    graceful_deadline: Duration,
    force_exit_after: Duration,
    quick_deadline: Duration,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::with_deadlines(GRACEFUL_DEADLINE, FORCE_EXIT_AFTER, QUICK_DEADLINE)
    }

    pub fn with_deadlines(
        graceful_deadline: Duration,
        force_exit_after: Duration,
        quick_deadline: Duration,
    ) -> Self {
        Self {
            root: CancellationToken::new(),
            hooks: Mutex::new(Vec::new()),
            shutting_down: AtomicBool::new(false),
            graceful_deadline,
            force_exit_after,
            quick_deadline,
        }
    }

    /// The root cancellable context, injected into every blocking operation.
    pub fn root_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Register a named hook. Hooks run in registration order.
    pub fn on_shutdown<F>(&self, name: &str, hook: F)
    where
        F: Fn(CancellationToken) -> BoxFuture<'static, Result<(), HookError>>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.lock().unwrap().push(ShutdownHook {
            name: name.to_string(),
            run: Box::new(hook),
        });
    }

    /// Listen for SIGINT/SIGTERM; on the first signal run the full graceful
    /// shutdown and exit 0.
    pub fn install_signal_handlers(self: Arc<Self>) {
        let manager = self;
        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                _ = sigterm.recv() => info!("SIGTERM received"),
            }
            manager.shutdown("signal").await;
            info!("graceful shutdown complete");
            std::process::exit(0);
        });
    }

    /// Cancel the root context and run every hook under the graceful
    /// deadline. Idempotent: only the first caller does the work.
    pub async fn shutdown(&self, reason: &str) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(reason, "shutdown in progress");

        // Backstop: if a hook wedges past the hard wall, stop pretending.
        let force_after = self.force_exit_after;
        tokio::spawn(async move {
            tokio::time::sleep(force_after).await;
            error!("force-exit backstop reached, terminating");
            std::process::exit(1);
        });

        self.root.cancel();
        self.run_hooks(self.graceful_deadline).await;
    }

    /// Hook pass for a normal return from main: same hooks, shorter window,
    /// no backstop. Skipped when a signal shutdown already ran them.
    pub async fn run_quick_hooks(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.root.cancel();
        self.run_hooks(self.quick_deadline).await;
    }

    async fn run_hooks(&self, deadline: Duration) {
        let deadline_at = Instant::now() + deadline;
        let deadline_token = CancellationToken::new();
        {
            let deadline_token = deadline_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                deadline_token.cancel();
            });
        }

        // Snapshot so a hook registering further hooks cannot deadlock us.
        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap());
        for hook in &hooks {
            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(hook = %hook.name, "shutdown deadline exhausted, skipping");
                continue;
            }
            match tokio::time::timeout(remaining, (hook.run)(deadline_token.clone())).await {
                Ok(Ok(())) => info!(hook = %hook.name, "shutdown hook complete"),
                Ok(Err(e)) => warn!(hook = %hook.name, error = %e, "shutdown hook failed"),
                Err(_) => warn!(hook = %hook.name, "shutdown hook timed out"),
            }
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
