//! Mention-based message admission.
//!
//! A mention is the literal pattern `@codebutler.<role>`. The pm role also
//! owns every message that mentions no one, so a bare "implement a feature"
//! lands with the pm while the other five roles stay quiet.

use std::sync::LazyLock;

use regex::Regex;

use codebutler_core::types::Role;

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@codebutler\.(\w+)").unwrap());

/// Every role string mentioned in `text`, in order of appearance.
pub fn mentions(text: &str) -> Vec<&str> {
    MENTION
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Admission rule: should an agent with `role` handle `text`?
///
/// The rule is a pure string test; no model is consulted. Multiple mentions
/// may admit multiple agents; each runs its own process and decides
/// independently.
pub fn should_process(role: Role, text: &str) -> bool {
    let mentioned = mentions(text);
    if mentioned.iter().any(|&m| m == role.as_str()) {
        return true;
    }
    role == Role::Pm && mentioned.is_empty()
}

/// Prefix an outbound body with `@codebutler.<role>: ` unless already there.
pub fn ensure_prefix(role: Role, text: &str) -> String {
    let prefix = format!("@codebutler.{}: ", role);
    if text.starts_with(&prefix) {
        text.to_string()
    } else {
        format!("{prefix}{text}")
    }
}
