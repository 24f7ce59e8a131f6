//! Skill descriptor parsing and the pm skill index.
//!
//! A skill file is markdown: the first `# <header>` line names the skill
//! (falling back to the filename stem), the first non-heading paragraph is
//! the description, and the first non-empty line under `## Trigger` lists
//! the triggers.

use std::path::{Path, PathBuf};

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub triggers: String,
}

/// Parse one skill descriptor.
pub fn parse_skill(content: &str, filename_stem: &str) -> Skill {
    let mut name = None;
    let mut description = String::new();
    let mut triggers = String::new();

    let mut in_trigger_section = false;
    let mut paragraph: Vec<&str> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(header) = trimmed.strip_prefix("# ") {
            if name.is_none() {
                name = Some(header.trim().to_string());
            }
            continue;
        }

        if trimmed.starts_with("##") {
            in_trigger_section = trimmed
                .trim_start_matches('#')
                .trim()
                .eq_ignore_ascii_case("trigger");
            continue;
        }

        if in_trigger_section {
            if !trimmed.is_empty() && triggers.is_empty() {
                triggers = trimmed.to_string();
            }
            continue;
        }

        // Accumulate the first non-heading paragraph as the description.
        if description.is_empty() {
            if trimmed.is_empty() {
                if !paragraph.is_empty() {
                    description = paragraph.join(" ");
                }
            } else {
                paragraph.push(trimmed);
            }
        }
    }
    if description.is_empty() && !paragraph.is_empty() {
        description = paragraph.join(" ");
    }

    Skill {
        name: name.unwrap_or_else(|| filename_stem.to_string()),
        description,
        triggers,
    }
}

/// Scan a skills directory for `*.md` descriptors.
///
/// Order follows directory iteration, so the index is deterministic for a
/// given directory state, not alphabetized. Returns the paths alongside the
/// parsed skills so the cache can snapshot their mtimes.
pub fn scan_skills(dir: &Path) -> std::io::Result<Vec<(PathBuf, Skill)>> {
    let mut skills = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match std::fs::read_to_string(&path) {
            Ok(content) => skills.push((path, parse_skill(&content, &stem))),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable skill file");
            }
        }
    }
    Ok(skills)
}

/// Render the skill index section, or `None` when there are no skills.
pub fn render_index(skills: &[Skill]) -> Option<String> {
    if skills.is_empty() {
        return None;
    }
    let mut out = String::from("## Available Skills\n");
    for skill in skills {
        out.push_str("\n- **");
        out.push_str(&skill.name);
        out.push_str("**: ");
        out.push_str(&skill.description);
        if !skill.triggers.is_empty() {
            out.push_str(&format!(" (triggers: {})", skill.triggers));
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_descriptor_parses() {
        let content = "# Release Notes\n\nDrafts release notes from merged PRs.\n\n## Trigger\n\nrelease, changelog\n";
        let skill = parse_skill(content, "release-notes");
        assert_eq!(skill.name, "Release Notes");
        assert_eq!(skill.description, "Drafts release notes from merged PRs.");
        assert_eq!(skill.triggers, "release, changelog");
    }

    #[test]
    fn name_falls_back_to_filename_stem() {
        let skill = parse_skill("Just a description.\n", "triage");
        assert_eq!(skill.name, "triage");
        assert_eq!(skill.description, "Just a description.");
        assert!(skill.triggers.is_empty());
    }

    #[test]
    fn multi_line_paragraph_joins_into_one_description() {
        let content = "# X\n\nFirst line\nsecond line.\n\nNot the description.\n";
        let skill = parse_skill(content, "x");
        assert_eq!(skill.description, "First line second line.");
    }

    #[test]
    fn index_lists_every_skill() {
        let skills = vec![
            Skill {
                name: "a".into(),
                description: "does a".into(),
                triggers: "go".into(),
            },
            Skill {
                name: "b".into(),
                description: "does b".into(),
                triggers: String::new(),
            },
        ];
        let index = render_index(&skills).unwrap();
        assert!(index.starts_with("## Available Skills"));
        assert!(index.contains("- **a**: does a (triggers: go)"));
        assert!(index.contains("- **b**: does b"));
        assert!(!index.contains("b (triggers"));
    }

    #[test]
    fn empty_skill_list_renders_nothing() {
        assert!(render_index(&[]).is_none());
    }

    #[test]
    fn non_markdown_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("skill.md"), "# S\n\nd\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let skills = scan_skills(dir.path()).unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].1.name, "S");
    }
}
