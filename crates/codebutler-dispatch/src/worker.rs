//! The per-thread worker loop.
//!
//! Each worker owns a bounded inbound queue and drains it one message at a
//! time. When the queue stays empty for the inactivity timeout the worker
//! removes itself from the registry and exits; a later dispatch for the same
//! thread spawns a fresh one.

use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

use codebutler_core::types::ThreadMessage;

use crate::registry::RegistryInner;

pub(crate) fn spawn(inner: Arc<RegistryInner>, thread_id: String) -> mpsc::Sender<ThreadMessage> {
    let (tx, rx) = mpsc::channel(inner.config.queue_capacity);
    debug!(thread_id = %thread_id, "thread worker spawned");
    tokio::spawn(run(inner, thread_id, rx));
    tx
}

enum IdleOutcome {
    /// A message raced in while the timer fired; deliver it and keep going.
    Drain(Box<ThreadMessage>),
    /// Queue confirmed empty under the registry lock; worker is deregistered.
    Exit,
}

async fn run(
    inner: Arc<RegistryInner>,
    thread_id: String,
    mut rx: mpsc::Receiver<ThreadMessage>,
) {
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => {
                debug!(thread_id = %thread_id, "worker cancelled");
                break;
            }
            received = rx.recv() => match received {
                Some(msg) => deliver(&inner, msg).await,
                None => break,
            },
            // A fresh sleep every iteration: any message resets the timer.
            _ = tokio::time::sleep(inner.config.inactivity_timeout) => {
                match idle_check(&inner, &thread_id, &mut rx) {
                    IdleOutcome::Drain(msg) => deliver(&inner, *msg).await,
                    IdleOutcome::Exit => {
                        debug!(thread_id = %thread_id, "worker idle, exiting");
                        break;
                    }
                }
            }
        }
    }
}

/// Decide between exit and drain with the registry locked, so no dispatch
/// can enqueue between the emptiness check and the map removal.
fn idle_check(
    inner: &RegistryInner,
    thread_id: &str,
    rx: &mut mpsc::Receiver<ThreadMessage>,
) -> IdleOutcome {
    let mut workers = inner.workers.lock().unwrap();
    match rx.try_recv() {
        Ok(msg) => IdleOutcome::Drain(Box::new(msg)),
        Err(_) => {
            workers.remove(thread_id);
            IdleOutcome::Exit
        }
    }
}

/// Invoke the handler with panic containment. A panicking or failing handler
/// is logged and the worker moves on to the next message.
async fn deliver(inner: &RegistryInner, msg: ThreadMessage) {
    let thread_id = msg.thread_id.clone();
    let message_id = msg.message_id.clone();

    let outcome = std::panic::AssertUnwindSafe(inner.handler.handle(msg))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(
                thread_id = %thread_id,
                message_id = %message_id,
                error = %e,
                "handler failed"
            );
        }
        Err(_) => {
            error!(
                thread_id = %thread_id,
                message_id = %message_id,
                "handler panicked"
            );
        }
    }
}
