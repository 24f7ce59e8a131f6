use serde::{Deserialize, Serialize};

/// A message to be delivered to the chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,

    /// Thread to reply into; `None` posts a new top-level message.
    pub thread_id: Option<String>,

    /// Plain text content. Already redacted and prefixed by the time the
    /// transport sees it.
    pub text: String,

    /// Display-name override so the message appears as `codebutler.<role>`.
    pub username: Option<String>,

    /// Icon override (emoji shortcode) matching the role identity.
    pub icon: Option<String>,
}

/// A platform callback routed back into the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    /// A rich-message button click.
    Button {
        action_id: String,
        user_id: String,
        channel_id: String,
        thread_id: String,
    },

    /// An emoji reaction added to one of our messages.
    Reaction {
        name: String,
        user_id: String,
        channel_id: String,
        message_id: String,
    },
}

impl Interaction {
    /// Routing key for the approval router: buttons dispatch by action id,
    /// reactions by emoji name.
    pub fn route_key(&self) -> &str {
        match self {
            Interaction::Button { action_id, .. } => action_id,
            Interaction::Reaction { name, .. } => name,
        }
    }
}
