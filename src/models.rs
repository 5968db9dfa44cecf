use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backoff::format_duration;

/// Repository-scoped pull request number; the unit of work of every pipeline
pub type PrNumber = u64;

/// One page of results from a paginated provider endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    /// Page to request next, `None` on the last page
    pub next_page: Option<u32>,
}

impl<T> PageResult<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page: None,
        }
    }

    pub fn with_next(items: Vec<T>, next_page: u32) -> Self {
        Self {
            items,
            next_page: Some(next_page),
        }
    }
}

/// Result of handling a single work item
#[derive(Debug)]
pub enum ProcessOutcome<T> {
    Success(T),
    /// Already recorded in the ledger
    Skipped,
    /// Non-fatal failure; the item stays eligible for the next run
    Failed(String),
    RateLimited(crate::error::ApiError),
}

/// Repository owner and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// LLM verdict for one pull request discussion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Excerpt of the discussion that concerns a vulnerability, empty if none
    #[serde(default)]
    pub relevant_discussion: String,
    #[serde(default)]
    pub reason: String,
}

/// One line of the classification JSONL output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub pr: PrNumber,
    pub relevant_discussion: String,
    pub reason: String,
}

impl ClassificationRecord {
    pub fn new(pr: PrNumber, verdict: Verdict) -> Self {
        Self {
            pr,
            relevant_discussion: verdict.relevant_discussion,
            reason: verdict.reason,
        }
    }

    pub fn is_flagged(&self) -> bool {
        !self.relevant_discussion.trim().is_empty()
    }
}

/// Conversation comment on the PR itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCommentPayload {
    pub id: u64,
    pub user_name: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Inline review comment attached to a diff hunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCommentPayload {
    pub id: u64,
    pub user_name: String,
    pub path: String,
    pub diff_hunk: String,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Discussion of one pull request, as written to `<pr>.json` and fed to the classifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    #[serde(default)]
    pub issue_comments: Vec<IssueCommentPayload>,
    #[serde(default)]
    pub review_comments: Vec<ReviewCommentPayload>,
}

impl Discussion {
    pub fn comment_count(&self) -> usize {
        self.issue_comments.len() + self.review_comments.len()
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items discovered by searches or listings
    pub fetched: usize,
    /// Items processed successfully and recorded in the ledger
    pub processed: usize,
    /// Items skipped because the ledger already had them
    pub skipped: usize,
    pub errored: usize,
    /// Rate-limit pauses taken
    pub pauses: usize,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary")?;
        writeln!(f, "  Fetched:            {}", self.fetched)?;
        writeln!(f, "  Processed:          {}", self.processed)?;
        writeln!(f, "  Skipped:            {}", self.skipped)?;
        writeln!(f, "  Errors:             {}", self.errored)?;
        writeln!(f, "  Rate-limit pauses:  {}", self.pauses)?;
        write!(f, "  Duration:           {}", format_duration(self.elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_flagged() {
        let record = ClassificationRecord::new(
            7,
            Verdict {
                relevant_discussion: "this allows SQL injection".to_string(),
                reason: "user input reaches the query".to_string(),
            },
        );
        assert!(record.is_flagged());
        assert!(!ClassificationRecord::new(8, Verdict::default()).is_flagged());
    }

    #[test]
    fn test_record_serializes_pr_field() {
        let record = ClassificationRecord::new(42, Verdict::default());
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(line, r#"{"pr":42,"relevant_discussion":"","reason":""}"#);
    }

    #[test]
    fn test_verdict_tolerates_missing_fields() {
        let verdict: Verdict = serde_json::from_str(r#"{"reason": "none"}"#).unwrap();
        assert_eq!(verdict.relevant_discussion, "");
        assert_eq!(verdict.reason, "none");
    }

    #[test]
    fn test_discussion_comment_type_field() {
        let json = r#"{
            "issue_comments": [
                {"id": 1, "user_name": "alice", "body": "LGTM", "type": "issue_comment",
                 "created_at": "2024-01-01T12:00:00Z", "updated_at": null}
            ]
        }"#;
        let discussion: Discussion = serde_json::from_str(json).unwrap();
        assert_eq!(discussion.issue_comments[0].kind, "issue_comment");
        assert!(discussion.review_comments.is_empty());
        assert_eq!(discussion.comment_count(), 1);
    }
}
