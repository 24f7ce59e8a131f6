use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ButlerError;

/// One of the six specialized agent roles attached to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Pm,
    Coder,
    Reviewer,
    Researcher,
    Artist,
    Lead,
}

impl Role {
    /// Every role, in the order agents are conventionally started.
    pub const ALL: [Role; 6] = [
        Role::Pm,
        Role::Coder,
        Role::Reviewer,
        Role::Researcher,
        Role::Artist,
        Role::Lead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pm => "pm",
            Role::Coder => "coder",
            Role::Reviewer => "reviewer",
            Role::Researcher => "researcher",
            Role::Artist => "artist",
            Role::Lead => "lead",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ButlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pm" => Ok(Role::Pm),
            "coder" => Ok(Role::Coder),
            "reviewer" => Ok(Role::Reviewer),
            "researcher" => Ok(Role::Researcher),
            "artist" => Ok(Role::Artist),
            "lead" => Ok(Role::Lead),
            other => Err(ButlerError::UnknownRole(other.to_string())),
        }
    }
}

/// Process-wide display identity for a role.
///
/// Outbound messages impersonate this identity via the chat transport's
/// username/icon overrides (or its closest equivalent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub role: Role,

    /// Display name shown in the channel, always `codebutler.<role>`.
    pub display_name: String,

    /// Emoji shortcode used as the avatar override (e.g. `:clipboard:`).
    pub icon: String,
}

impl AgentIdentity {
    pub fn for_role(role: Role) -> Self {
        let icon = match role {
            Role::Pm => ":clipboard:",
            Role::Coder => ":hammer_and_wrench:",
            Role::Reviewer => ":mag:",
            Role::Researcher => ":books:",
            Role::Artist => ":art:",
            Role::Lead => ":compass:",
        };
        Self {
            role,
            display_name: format!("codebutler.{}", role),
            icon: icon.to_string(),
        }
    }
}

/// An inbound event as produced by the chat transport.
///
/// Event ids are unique per occurrence; platform retries reuse the id, which
/// is what the dedup layer keys on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Globally unique id for this delivery attempt's logical event.
    pub event_id: String,

    pub channel_id: String,

    /// Thread id; equal to `message_id` for top-level messages.
    pub thread_id: String,

    pub message_id: String,

    pub sender_id: String,

    /// True when the sender is a bot (including our own identities).
    pub sender_is_bot: bool,

    /// Plain text body.
    pub text: String,
}

/// The internal form handed to a thread worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub thread_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub sender_id: String,
    pub text: String,
}

impl From<&ChatEvent> for ThreadMessage {
    fn from(event: &ChatEvent) -> Self {
        Self {
            thread_id: event.thread_id.clone(),
            channel_id: event.channel_id.clone(),
            message_id: event.message_id.clone(),
            sender_id: event.sender_id.clone(),
            text: event.text.clone(),
        }
    }
}

/// Coarse lifecycle phase of a conversation thread.
///
/// `Coding` vetoes orphan reclamation: a worktree with an in-flight coding
/// phase is never garbage collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadPhase {
    Planning,
    Coding,
    Review,
    Done,
    Unknown,
}

impl FromStr for ThreadPhase {
    type Err = std::convert::Infallible;

    /// Unrecognized phases parse as `Unknown` so probe payloads from newer
    /// collaborators never fail the GC pass.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "planning" => ThreadPhase::Planning,
            "coding" => ThreadPhase::Coding,
            "review" => ThreadPhase::Review,
            "done" => ThreadPhase::Done,
            _ => ThreadPhase::Unknown,
        })
    }
}

impl fmt::Display for ThreadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreadPhase::Planning => "planning",
            ThreadPhase::Coding => "coding",
            ThreadPhase::Review => "review",
            ThreadPhase::Done => "done",
            ThreadPhase::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Binding between a managed branch and the thread that owns it.
///
/// At most one mapping exists per branch; the branch name uniquely determines
/// the worktree path under the branches directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeMapping {
    /// Full branch name, `codebutler/<slug>`.
    pub branch: String,

    pub channel_id: String,

    pub thread_id: String,

    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_an_error() {
        assert!("plumber".parse::<Role>().is_err());
    }

    #[test]
    fn identity_display_name_is_prefixed() {
        let id = AgentIdentity::for_role(Role::Coder);
        assert_eq!(id.display_name, "codebutler.coder");
        assert!(!id.icon.is_empty());
    }

    #[test]
    fn unknown_phase_parses_as_unknown() {
        let phase: ThreadPhase = "deploying".parse().unwrap();
        assert_eq!(phase, ThreadPhase::Unknown);
    }

    #[test]
    fn thread_message_from_event_keeps_thread_scope() {
        let event = ChatEvent {
            event_id: "Ev1".into(),
            channel_id: "C1".into(),
            thread_id: "169.100".into(),
            message_id: "169.200".into(),
            sender_id: "U1".into(),
            sender_is_bot: false,
            text: "hello".into(),
        };
        let msg = ThreadMessage::from(&event);
        assert_eq!(msg.thread_id, "169.100");
        assert_eq!(msg.message_id, "169.200");
    }
}
