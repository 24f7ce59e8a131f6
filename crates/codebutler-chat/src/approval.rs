//! Approval flows: plan review and destructive-action confirmation.
//!
//! On platforms with an interactive surface these render as button rows; on
//! anything else the numbered plain-text fallback is posted instead. Button
//! clicks and emoji reactions both come back as [`Interaction`]s and are
//! dispatched by the [`ApprovalRouter`].

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::Interaction;

pub const ACTION_PLAN_APPROVE: &str = "plan_approve";
pub const ACTION_PLAN_MODIFY: &str = "plan_modify";
pub const ACTION_PLAN_REJECT: &str = "plan_reject";
pub const ACTION_DANGER_APPROVE: &str = "danger_approve";
pub const ACTION_DANGER_REJECT: &str = "danger_reject";

/// Reaction names with a fixed meaning.
pub const REACTION_APPROVE: &str = "+1";
pub const REACTION_STOP: &str = "octagonal_sign";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Default,
    Danger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalButton {
    pub action_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl ApprovalButton {
    fn new(action_id: &str, label: &str, style: ButtonStyle) -> Self {
        Self {
            action_id: action_id.to_string(),
            label: label.to_string(),
            style,
        }
    }
}

/// A rich interactive message asking a human for a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalMessage {
    pub channel: String,
    pub thread_id: String,
    pub text: String,
    pub buttons: Vec<ApprovalButton>,
}

impl ApprovalMessage {
    /// Plan-review prompt: approve / modify / reject, reject danger-styled.
    pub fn plan_review(channel: &str, thread_id: &str, summary: &str) -> Self {
        Self {
            channel: channel.to_string(),
            thread_id: thread_id.to_string(),
            text: format!("Plan ready for review:\n{summary}"),
            buttons: vec![
                ApprovalButton::new(ACTION_PLAN_APPROVE, "Approve", ButtonStyle::Default),
                ApprovalButton::new(ACTION_PLAN_MODIFY, "Modify", ButtonStyle::Default),
                ApprovalButton::new(ACTION_PLAN_REJECT, "Reject", ButtonStyle::Danger),
            ],
        }
    }

    /// Destructive-action prompt: approve (danger-styled) / reject.
    pub fn destructive(channel: &str, thread_id: &str, description: &str) -> Self {
        Self {
            channel: channel.to_string(),
            thread_id: thread_id.to_string(),
            text: format!("Destructive action requires approval:\n{description}"),
            buttons: vec![
                ApprovalButton::new(ACTION_DANGER_APPROVE, "Approve", ButtonStyle::Danger),
                ApprovalButton::new(ACTION_DANGER_REJECT, "Reject", ButtonStyle::Default),
            ],
        }
    }

    /// Numbered-options rendering for transports without buttons.
    pub fn fallback_text(&self) -> String {
        let mut out = self.text.clone();
        out.push_str("\n\nReply with the number of your choice:");
        for (i, button) in self.buttons.iter().enumerate() {
            out.push_str(&format!("\n  {}. {}", i + 1, button.label));
        }
        out
    }
}

/// A human decision distilled from a button click or reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalSignal {
    Approved,
    Stop,
}

/// Interpret an interaction as an approval/stop signal, if it is one.
///
/// `+1` reactions and both approve buttons count as approvals; the
/// `octagonal_sign` reaction is the emergency stop.
pub fn approval_signal(interaction: &Interaction) -> Option<ApprovalSignal> {
    match interaction {
        Interaction::Button { action_id, .. }
            if action_id == ACTION_PLAN_APPROVE || action_id == ACTION_DANGER_APPROVE =>
        {
            Some(ApprovalSignal::Approved)
        }
        Interaction::Reaction { name, .. } if name == REACTION_APPROVE => {
            Some(ApprovalSignal::Approved)
        }
        Interaction::Reaction { name, .. } if name == REACTION_STOP => {
            Some(ApprovalSignal::Stop)
        }
        _ => None,
    }
}

#[async_trait]
pub trait InteractionHandler: Send + Sync {
    async fn handle(&self, interaction: &Interaction);
}

/// Dispatches platform callbacks to registered handlers.
///
/// Buttons route by action id, reactions by emoji name. Unknown keys are
/// logged and ignored; a stale message with retired buttons must not crash
/// the agent.
pub struct ApprovalRouter {
    handlers: DashMap<String, Arc<dyn InteractionHandler>>,
}

impl ApprovalRouter {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register a handler. A second registration for the same key replaces
    /// the first.
    pub fn register(&self, key: &str, handler: Arc<dyn InteractionHandler>) {
        debug!(key, "interaction handler registered");
        self.handlers.insert(key.to_string(), handler);
    }

    pub async fn route(&self, interaction: &Interaction) {
        let key = interaction.route_key().to_string();
        let handler = self.handlers.get(&key).map(|h| Arc::clone(h.value()));
        match handler {
            Some(handler) => handler.handle(interaction).await,
            None => warn!(key, "interaction with no registered handler ignored"),
        }
    }
}

impl Default for ApprovalRouter {
    fn default() -> Self {
        Self::new()
    }
}
