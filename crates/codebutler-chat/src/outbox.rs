//! The single choke point for outbound traffic.
//!
//! Every message an agent originates goes out through here, so redaction,
//! role prefixing, and identity overrides cannot be skipped at a call site.

use std::sync::Arc;

use codebutler_core::types::AgentIdentity;

use crate::approval::ApprovalMessage;
use crate::error::Result;
use crate::mention;
use crate::redact::Redactor;
use crate::transport::ChatTransport;
use crate::types::OutboundMessage;

pub struct Outbox {
    transport: Arc<dyn ChatTransport>,
    identity: AgentIdentity,
    redactor: Redactor,
}

impl Outbox {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        identity: AgentIdentity,
        redactor: Redactor,
    ) -> Self {
        Self {
            transport,
            identity,
            redactor,
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// Post a redacted, prefixed message as this agent's identity.
    pub async fn say(&self, channel: &str, thread_id: Option<&str>, text: &str) -> Result<()> {
        let body = mention::ensure_prefix(self.identity.role, text);
        let body = self.redactor.redact(&body);
        self.transport
            .post_message(&OutboundMessage {
                channel: channel.to_string(),
                thread_id: thread_id.map(str::to_string),
                text: body,
                username: Some(self.identity.display_name.clone()),
                icon: Some(self.identity.icon.clone()),
            })
            .await
    }

    /// Post an approval prompt, falling back to numbered plain text when the
    /// transport has no interactive surface. The body is redacted either way.
    pub async fn ask_approval(&self, mut msg: ApprovalMessage) -> Result<()> {
        msg.text = self.redactor.redact(&msg.text);
        if self.transport.supports_interactive() {
            self.transport.post_approval(&msg).await
        } else {
            self.say(&msg.channel, Some(&msg.thread_id), &msg.fallback_text())
                .await
        }
    }

    /// Acknowledge an admitted message with a reaction.
    pub async fn acknowledge(&self, channel: &str, message_id: &str) -> Result<()> {
        self.transport.add_reaction(channel, message_id, "eyes").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codebutler_core::types::{ChatEvent, Role};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        posted: Mutex<Vec<OutboundMessage>>,
        approvals: Mutex<Vec<ApprovalMessage>>,
        interactive: bool,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn next_event(&self) -> Option<ChatEvent> {
            None
        }

        async fn post_message(&self, msg: &OutboundMessage) -> Result<()> {
            self.posted.lock().unwrap().push(msg.clone());
            Ok(())
        }

        async fn post_approval(&self, msg: &ApprovalMessage) -> Result<()> {
            self.approvals.lock().unwrap().push(msg.clone());
            Ok(())
        }

        async fn add_reaction(&self, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        fn supports_interactive(&self) -> bool {
            self.interactive
        }
    }

    fn outbox(transport: Arc<RecordingTransport>) -> Outbox {
        Outbox::new(
            transport,
            AgentIdentity::for_role(Role::Coder),
            Redactor::new(),
        )
    }

    #[tokio::test]
    async fn say_prefixes_redacts_and_sets_identity() {
        let transport = Arc::new(RecordingTransport::default());
        outbox(transport.clone())
            .say("C1", Some("T1"), "token is sk-abcdefghijklmnopqrstuvwxyz12")
            .await
            .unwrap();

        let posted = transport.posted.lock().unwrap();
        assert_eq!(
            posted[0].text,
            "@codebutler.coder: token is [REDACTED]"
        );
        assert_eq!(posted[0].username.as_deref(), Some("codebutler.coder"));
        assert_eq!(posted[0].thread_id.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn approval_falls_back_to_numbered_text() {
        let transport = Arc::new(RecordingTransport::default());
        let msg = ApprovalMessage::destructive("C1", "T1", "remove worktree");
        outbox(transport.clone()).ask_approval(msg).await.unwrap();

        assert!(transport.approvals.lock().unwrap().is_empty());
        let posted = transport.posted.lock().unwrap();
        assert!(posted[0].text.contains("1. Approve"));
    }

    #[tokio::test]
    async fn approval_uses_interactive_surface_when_supported() {
        let transport = Arc::new(RecordingTransport {
            interactive: true,
            ..Default::default()
        });
        let msg = ApprovalMessage::plan_review("C1", "T1", "the plan");
        outbox(transport.clone()).ask_approval(msg).await.unwrap();

        assert_eq!(transport.approvals.lock().unwrap().len(), 1);
        assert!(transport.posted.lock().unwrap().is_empty());
    }
}
