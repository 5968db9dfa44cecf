use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::classify::discover_json_files;
use crate::github::comments::strip_prefixed_comments;
use crate::models::Discussion;

/// What a stripping pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripReport {
    pub scanned: usize,
    pub rewritten: usize,
    pub removed: usize,
    pub unreadable: usize,
}

impl fmt::Display for StripReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strip summary")?;
        writeln!(f, "  Files scanned:      {}", self.scanned)?;
        writeln!(f, "  Files rewritten:    {}", self.rewritten)?;
        writeln!(f, "  Comments removed:   {}", self.removed)?;
        write!(f, "  Unreadable files:   {}", self.unreadable)
    }
}

/// Drop bot comments from every discussion file under `dir`.
///
/// Files without a matching comment are left byte-for-byte untouched; files that
/// cannot be read or parsed are logged and skipped.
pub fn strip_directory(dir: &Path, prefixes: &[String]) -> Result<StripReport> {
    if !dir.is_dir() {
        anyhow::bail!("Directory not found: {}", dir.display());
    }

    let mut report = StripReport::default();

    for path in discover_json_files(dir)? {
        report.scanned += 1;

        let mut discussion: Discussion = match fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from))
        {
            Ok(discussion) => discussion,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                report.unreadable += 1;
                continue;
            }
        };

        let removed = strip_prefixed_comments(&mut discussion, prefixes);
        if removed == 0 {
            debug!(path = %path.display(), "Nothing to strip");
            continue;
        }

        let content = serde_json::to_string_pretty(&discussion)
            .context("Failed to serialize discussion")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        info!(path = %path.display(), removed, "Stripped comments");
        report.rewritten += 1;
        report.removed += removed;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const STATS: &str = "## Stats from current PR";

    #[test]
    fn test_strips_only_matching_files() {
        let dir = tempdir().unwrap();
        let with_stats = dir.path().join("xss/1.json");
        let clean = dir.path().join("xss/2.json");
        let broken = dir.path().join("xss/3.json");
        fs::create_dir_all(dir.path().join("xss")).unwrap();

        fs::write(
            &with_stats,
            r###"{"issue_comments": [
                {"id": 1, "user_name": "bot", "body": "## Stats from current PR\n| x |", "type": "issue_comment", "created_at": null, "updated_at": null},
                {"id": 2, "user_name": "alice", "body": "escape this input", "type": "issue_comment", "created_at": null, "updated_at": null}
            ], "review_comments": []}"###,
        )
        .unwrap();
        let clean_content = r#"{"issue_comments":[],"review_comments":[]}"#;
        fs::write(&clean, clean_content).unwrap();
        fs::write(&broken, "{oops").unwrap();

        let report = strip_directory(dir.path(), &[STATS.to_string()]).unwrap();

        assert_eq!(
            report,
            StripReport {
                scanned: 3,
                rewritten: 1,
                removed: 1,
                unreadable: 1,
            }
        );

        let stripped: Discussion =
            serde_json::from_str(&fs::read_to_string(&with_stats).unwrap()).unwrap();
        assert_eq!(stripped.issue_comments.len(), 1);
        assert_eq!(stripped.issue_comments[0].user_name, "alice");
        assert_eq!(fs::read_to_string(&clean).unwrap(), clean_content);
    }

    #[test]
    fn test_missing_dir_is_error() {
        let dir = tempdir().unwrap();
        assert!(strip_directory(&dir.path().join("absent"), &[]).is_err());
    }
}
