use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use codebutler_core::config::AgentConfig;
use codebutler_core::types::ThreadMessage;

use crate::worker;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The per-message handler supplied by the agent runtime.
///
/// Invocations for the same thread are strictly sequential and in arrival
/// order; invocations for distinct threads run in parallel.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: ThreadMessage) -> Result<(), HandlerError>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bound on each worker's inbound queue. Overflow drops with a warning;
    /// chat inbound rates make a full queue an anomaly, not a steady state.
    pub queue_capacity: usize,

    /// Idle time after which a worker removes itself and exits.
    pub inactivity_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            inactivity_timeout: Duration::from_secs(1800),
        }
    }
}

impl From<&AgentConfig> for WorkerConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            inactivity_timeout: config.inactivity_timeout(),
        }
    }
}

pub(crate) struct RegistryInner {
    pub(crate) workers: Mutex<HashMap<String, mpsc::Sender<ThreadMessage>>>,
    pub(crate) config: WorkerConfig,
    pub(crate) handler: Arc<dyn MessageHandler>,
    pub(crate) cancel: CancellationToken,
}

/// Maps thread id → worker and owns worker lifecycles.
#[derive(Clone)]
pub struct ThreadRegistry {
    inner: Arc<RegistryInner>,
}

impl ThreadRegistry {
    pub fn new(
        config: WorkerConfig,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                workers: Mutex::new(HashMap::new()),
                config,
                handler,
                cancel,
            }),
        }
    }

    /// Route a message to its thread's worker, creating the worker on the
    /// first message. Never blocks the caller: a full queue drops the
    /// message with a warning.
    pub fn dispatch(&self, msg: ThreadMessage) {
        let thread_id = msg.thread_id.clone();
        let mut workers = self.inner.workers.lock().unwrap();

        let sender = workers
            .entry(thread_id.clone())
            .or_insert_with(|| worker::spawn(Arc::clone(&self.inner), thread_id.clone()))
            .clone();

        match sender.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    thread_id = %dropped.thread_id,
                    message_id = %dropped.message_id,
                    "worker queue full, dropping message"
                );
            }
            Err(mpsc::error::TrySendError::Closed(msg)) => {
                // The worker exited between our map lookup and the send
                // (e.g. shutdown cancellation). Respawn once.
                debug!(thread_id = %thread_id, "worker gone, respawning");
                let sender =
                    worker::spawn(Arc::clone(&self.inner), thread_id.clone());
                if sender.try_send(msg).is_err() {
                    warn!(thread_id = %thread_id, "respawned worker rejected message");
                }
                workers.insert(thread_id, sender);
            }
        }
    }

    /// Number of currently live workers.
    pub fn active_threads(&self) -> usize {
        self.inner.workers.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn msg(thread_id: &str, n: usize) -> ThreadMessage {
        ThreadMessage {
            thread_id: thread_id.to_string(),
            channel_id: "C1".to_string(),
            message_id: format!("{thread_id}.{n}"),
            sender_id: "U1".to_string(),
            text: format!("message {n}"),
        }
    }

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, msg: ThreadMessage) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(msg.message_id);
            Ok(())
        }
    }

    fn registry(
        handler: Arc<dyn MessageHandler>,
        inactivity: Duration,
        capacity: usize,
    ) -> ThreadRegistry {
        ThreadRegistry::new(
            WorkerConfig {
                queue_capacity: capacity,
                inactivity_timeout: inactivity,
            },
            handler,
            CancellationToken::new(),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn messages_within_a_thread_stay_fifo() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let registry = registry(recorder.clone(), Duration::from_secs(60), 64);

        for n in 0..20 {
            registry.dispatch(msg("T1", n));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let seen = recorder.seen.lock().unwrap();
        let expected: Vec<String> = (0..20).map(|n| format!("T1.{n}")).collect();
        assert_eq!(*seen, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn idle_worker_dies_and_respawns_on_next_message() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let registry = registry(recorder.clone(), Duration::from_millis(100), 64);

        registry.dispatch(msg("T1", 0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.active_threads(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(registry.active_threads(), 0);

        registry.dispatch(msg("T1", 1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.active_threads(), 1);
        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
    }

    struct Panicker {
        handled: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for Panicker {
        async fn handle(&self, msg: ThreadMessage) -> Result<(), HandlerError> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            if msg.text.contains("boom") {
                panic!("handler exploded");
            }
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_handler_does_not_kill_the_worker() {
        let handler = Arc::new(Panicker {
            handled: AtomicUsize::new(0),
        });
        let registry = registry(handler.clone(), Duration::from_secs(60), 64);

        let mut bad = msg("T1", 0);
        bad.text = "boom".to_string();
        registry.dispatch(bad);
        registry.dispatch(msg("T1", 1));
        registry.dispatch(msg("T1", 2));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(handler.handled.load(Ordering::SeqCst), 3);
        assert_eq!(registry.active_threads(), 1);
    }

    struct Gated {
        release: Arc<Notify>,
        handled: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for Gated {
        async fn handle(&self, _msg: ThreadMessage) -> Result<(), HandlerError> {
            self.release.notified().await;
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_queue_drops_instead_of_blocking() {
        let release = Arc::new(Notify::new());
        let handler = Arc::new(Gated {
            release: release.clone(),
            handled: AtomicUsize::new(0),
        });
        let registry = registry(handler.clone(), Duration::from_secs(60), 1);

        // First message occupies the handler, second fills the queue,
        // third must be dropped without blocking this task.
        registry.dispatch(msg("T1", 0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.dispatch(msg("T1", 1));
        registry.dispatch(msg("T1", 2));

        release.notify_waiters();
        tokio::time::sleep(Duration::from_millis(50)).await;
        release.notify_waiters();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(handler.handled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn threads_run_in_parallel() {
        let release = Arc::new(Notify::new());
        let gated = Arc::new(Gated {
            release: release.clone(),
            handled: AtomicUsize::new(0),
        });
        let registry = registry(gated.clone(), Duration::from_secs(60), 64);

        // T1's handler parks; T2 must still make progress.
        registry.dispatch(msg("T1", 0));
        registry.dispatch(msg("T2", 0));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(registry.active_threads(), 2);

        release.notify_waiters();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(gated.handled.load(Ordering::SeqCst), 2);
    }
}
