//! Local development stand-ins for the injected collaborators.
//!
//! These exist so `codebutler --role pm` runs end-to-end on a laptop with no
//! chat platform attached: the console is the channel, the executor echoes,
//! and the probes answer conservatively so the GC never destroys anything.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use codebutler_chat::approval::ApprovalMessage;
use codebutler_chat::transport::ChatTransport;
use codebutler_chat::types::OutboundMessage;
use codebutler_core::types::{ChatEvent, ThreadMessage, ThreadPhase};
use codebutler_gc::ThreadProbes;

use crate::error::Result;
use crate::executor::Executor;
use crate::workspace::WorkspaceHandle;

/// Reads stdin lines as top-level messages in a single `console` channel and
/// prints outbound traffic to stdout.
pub struct ConsoleTransport {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    sequence: AtomicU64,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            sequence: AtomicU64::new(1),
        }
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn next_event(&self) -> Option<ChatEvent> {
        let line = self.lines.lock().await.next_line().await.ok().flatten()?;
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        Some(ChatEvent {
            event_id: format!("console-ev-{n}"),
            channel_id: "console".to_string(),
            // Every line is its own top-level message and thus its own thread.
            thread_id: format!("console-{n}"),
            message_id: format!("console-{n}"),
            sender_id: "operator".to_string(),
            sender_is_bot: false,
            text: line,
        })
    }

    async fn post_message(&self, msg: &OutboundMessage) -> codebutler_chat::Result<()> {
        println!("{}", msg.text);
        Ok(())
    }

    async fn post_approval(&self, msg: &ApprovalMessage) -> codebutler_chat::Result<()> {
        println!("{}", msg.fallback_text());
        Ok(())
    }

    async fn add_reaction(
        &self,
        _channel: &str,
        _message_id: &str,
        _name: &str,
    ) -> codebutler_chat::Result<()> {
        Ok(())
    }

    fn supports_interactive(&self) -> bool {
        false
    }
}

/// Conservative probe bundle: every thread looks alive and recently active,
/// so no worktree is ever orphaned. The right answer when there is no real
/// platform to ask.
pub struct ConservativeProbes;

#[async_trait]
impl ThreadProbes for ConservativeProbes {
    async fn last_activity(
        &self,
        _channel: &str,
        _thread: &str,
    ) -> codebutler_gc::Result<Option<DateTime<Utc>>> {
        Ok(Some(Utc::now()))
    }

    async fn is_thread_active(&self, _channel: &str, _thread: &str) -> codebutler_gc::Result<bool> {
        Ok(true)
    }

    async fn has_conversation(
        &self,
        _channel: &str,
        _thread: &str,
    ) -> codebutler_gc::Result<bool> {
        Ok(false)
    }

    async fn has_open_pr(&self, _branch: &str) -> codebutler_gc::Result<bool> {
        Ok(true)
    }

    async fn get_phase(&self, _channel: &str, _thread: &str) -> codebutler_gc::Result<ThreadPhase> {
        Ok(ThreadPhase::Unknown)
    }
}

/// Echoes the inbound text and reports the prompt size, which is enough to
/// verify seeds, routing, and redaction interactively.
pub struct EchoExecutor;

#[async_trait]
impl Executor for EchoExecutor {
    async fn run(
        &self,
        system_prompt: &str,
        msg: &ThreadMessage,
        _workspace: &WorkspaceHandle,
        _cancel: &CancellationToken,
    ) -> Result<String> {
        info!(prompt_chars = system_prompt.len(), "echo executor invoked");
        Ok(format!("(dev echo) {}", msg.text))
    }
}

/// Bundle the console stand-ins for the binary.
pub fn console_collaborators() -> (
    Arc<ConsoleTransport>,
    Arc<ConservativeProbes>,
    Arc<EchoExecutor>,
) {
    (
        Arc::new(ConsoleTransport::new()),
        Arc::new(ConservativeProbes),
        Arc::new(EchoExecutor),
    )
}
