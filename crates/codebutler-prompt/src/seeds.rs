//! Seed file loading.
//!
//! Seeds are plain markdown. Everything from the `## Archived Learnings`
//! marker line onward is kept on disk for humans but excluded from the
//! assembled prompt.

use std::path::Path;

use crate::error::{PromptError, Result};

pub const ARCHIVE_MARKER: &str = "## Archived Learnings";

/// Strip the archived-learnings tail, if present.
pub fn exclude_archived(content: &str) -> &str {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim_end() == ARCHIVE_MARKER {
            return content[..offset].trim_end();
        }
        offset += line.len();
    }
    content
}

/// Load a required seed file with the archive tail stripped.
pub fn load_required(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(PromptError::MissingSeed {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(exclude_archived(&content).to_string())
}

/// Load an optional seed file; `None` when absent.
pub fn load_optional(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(exclude_archived(&content).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_tail_is_stripped() {
        let seed = "# Coder\n\nBe careful.\n\n## Archived Learnings\n\nold stuff\n";
        assert_eq!(exclude_archived(seed), "# Coder\n\nBe careful.");
    }

    #[test]
    fn marker_must_be_its_own_line() {
        let seed = "notes about ## Archived Learnings in prose\nmore";
        assert_eq!(exclude_archived(seed), seed);
    }

    #[test]
    fn marker_at_start_empties_the_seed() {
        assert_eq!(exclude_archived("## Archived Learnings\nx"), "");
    }

    #[test]
    fn exclude_archived_is_idempotent() {
        let seed = "body\n\n## Archived Learnings\nold";
        let once = exclude_archived(seed);
        assert_eq!(exclude_archived(once), once);
    }

    #[test]
    fn missing_required_seed_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_required(&dir.path().join("pm.md")).unwrap_err();
        assert!(matches!(err, PromptError::MissingSeed { .. }));
    }

    #[test]
    fn optional_seed_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_optional(&dir.path().join("workflows.md"))
            .unwrap()
            .is_none());
    }
}
