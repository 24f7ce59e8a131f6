//! Deterministic branch naming.
//!
//! Worktree branches are `codebutler/<slug>`: lower-cased, non-alphanumerics
//! folded to `-`, runs collapsed, trimmed, capped at 50 characters. The slug
//! function is idempotent, so a branch name can be re-slugged safely.

pub const BRANCH_PREFIX: &str = "codebutler/";

const MAX_SLUG_LEN: usize = 50;

pub fn slug(description: &str) -> String {
    let mut out = String::with_capacity(description.len().min(MAX_SLUG_LEN));
    let mut last_dash = true; // suppress a leading dash

    for ch in description.chars() {
        if out.len() >= MAX_SLUG_LEN {
            break;
        }
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Full branch name for a work description.
pub fn branch_for(description: &str) -> String {
    format!("{BRANCH_PREFIX}{}", slug(description))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_and_collapses() {
        assert_eq!(slug("Add OAuth2 login!!"), "add-oauth2-login");
        assert_eq!(slug("  fix   spacing  "), "fix-spacing");
        assert_eq!(slug("café menu"), "caf-menu");
    }

    #[test]
    fn truncates_to_fifty_without_trailing_dash() {
        let long = "a very long description that keeps going and going and going";
        let s = slug(long);
        assert!(s.len() <= 50);
        assert!(!s.ends_with('-'));
    }

    #[test]
    fn slug_is_idempotent() {
        for input in [
            "Add OAuth2 login!!",
            "  fix   spacing  ",
            "a very long description that keeps going and going and going",
            "UPPER_case_mix 123",
        ] {
            let once = slug(input);
            assert_eq!(slug(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn branch_name_carries_the_prefix() {
        assert_eq!(branch_for("Fix login bug"), "codebutler/fix-login-bug");
    }

    #[test]
    fn empty_and_symbol_only_inputs_give_empty_slug() {
        assert_eq!(slug(""), "");
        assert_eq!(slug("!!!"), "");
    }
}
