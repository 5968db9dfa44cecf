use crate::error::ApiError;
use crate::fetch::fetch_all_pages;
use crate::models::{Discussion, IssueCommentPayload, PrNumber, ReviewCommentPayload};

use super::{PullRequestSource, RawIssueComment, RawReviewComment, RawUser};

const ISSUE_COMMENT: &str = "issue_comment";

/// Fetch every issue and review comment of a PR.
///
/// Rate-limit failures are returned to the caller untouched, so a throttled
/// comment fetch is retried as a whole once the caller has checkpointed.
pub async fn fetch_discussion<S: PullRequestSource + ?Sized>(
    source: &S,
    number: PrNumber,
    per_page: u8,
) -> Result<Discussion, ApiError> {
    let label = format!("comments of PR #{number}");

    let issue = fetch_all_pages(&label, per_page, None, move |page, per_page| {
        source.issue_comments(number, page, per_page)
    })
    .await?;

    let review = fetch_all_pages(&label, per_page, None, move |page, per_page| {
        source.review_comments(number, page, per_page)
    })
    .await?;

    Ok(to_discussion(issue, review))
}

/// Convert raw API comments into the discussion shape, each list ordered by creation time
pub fn to_discussion(issue: Vec<RawIssueComment>, review: Vec<RawReviewComment>) -> Discussion {
    let mut issue_comments: Vec<IssueCommentPayload> = issue
        .into_iter()
        .map(|c| IssueCommentPayload {
            id: c.id,
            user_name: login(c.user.as_ref()),
            body: c.body.unwrap_or_default(),
            kind: ISSUE_COMMENT.to_string(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect();

    let mut review_comments: Vec<ReviewCommentPayload> = review
        .into_iter()
        .map(|c| ReviewCommentPayload {
            id: c.id,
            user_name: login(c.user.as_ref()),
            path: c.path,
            diff_hunk: c.diff_hunk,
            body: c.body.unwrap_or_default(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect();

    // Stable sort keeps API order for equal timestamps; undated comments go first
    issue_comments.sort_by_key(|c| c.created_at);
    review_comments.sort_by_key(|c| c.created_at);

    Discussion {
        issue_comments,
        review_comments,
    }
}

fn login(user: Option<&RawUser>) -> String {
    user.map(|u| u.login.clone()).unwrap_or_default()
}

/// Drop issue comments whose trimmed body starts with any of `prefixes`.
/// Returns how many comments were removed.
pub fn strip_prefixed_comments(discussion: &mut Discussion, prefixes: &[String]) -> usize {
    let before = discussion.issue_comments.len();
    discussion.issue_comments.retain(|c| {
        let body = c.body.trim();
        !prefixes.iter().any(|p| body.starts_with(p.as_str()))
    });
    before - discussion.issue_comments.len()
}
