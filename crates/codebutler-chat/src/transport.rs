use async_trait::async_trait;

use codebutler_core::types::ChatEvent;

use crate::approval::ApprovalMessage;
use crate::error::Result;
use crate::types::{Interaction, OutboundMessage};

/// Injected chat transport seam.
///
/// Implementations wrap a concrete platform client (socket-mode bridge,
/// local stub, …) and choose their own authentication. They must be
/// `Send + Sync` so the agent can drive them from multiple Tokio tasks.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Next inbound event, or `None` once the transport has shut down.
    ///
    /// Called from a single receive loop; implementations may serialize
    /// internally (e.g. a mutex around an mpsc receiver).
    async fn next_event(&self) -> Option<ChatEvent>;

    /// Deliver one plain-text message.
    async fn post_message(&self, msg: &OutboundMessage) -> Result<()>;

    /// Deliver a rich interactive approval message.
    ///
    /// Transports without an interactive surface should post
    /// [`ApprovalMessage::fallback_text`] via their plain path instead.
    async fn post_approval(&self, msg: &ApprovalMessage) -> Result<()>;

    /// Add an emoji reaction to a message.
    async fn add_reaction(&self, channel: &str, message_id: &str, name: &str) -> Result<()>;

    /// Remove a previously added reaction. Default no-op for transports
    /// whose reactions cannot be retracted.
    async fn remove_reaction(
        &self,
        _channel: &str,
        _message_id: &str,
        _name: &str,
    ) -> Result<()> {
        Ok(())
    }

    /// Next button click or reaction callback. The default is a transport
    /// with no interactive surface: the stream is immediately exhausted.
    async fn next_interaction(&self) -> Option<Interaction> {
        None
    }

    /// Release platform resources. Called once from a shutdown hook.
    async fn close(&self) {}

    /// Whether `post_approval` renders real buttons on this platform.
    fn supports_interactive(&self) -> bool;
}
