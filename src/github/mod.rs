pub mod client;
pub mod comments;

pub use client::GitHubClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::{PageResult, PrNumber, Repository};

/// Author of a comment as returned by the GitHub REST API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub login: String,
}

/// `GET /repos/{owner}/{repo}/issues/{number}/comments` item
#[derive(Debug, Clone, Deserialize)]
pub struct RawIssueComment {
    pub id: u64,
    pub user: Option<RawUser>,
    pub body: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `GET /repos/{owner}/{repo}/pulls/{number}/comments` item
#[derive(Debug, Clone, Deserialize)]
pub struct RawReviewComment {
    pub id: u64,
    pub user: Option<RawUser>,
    pub body: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub diff_hunk: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Read access to a repository's pull requests
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    fn repository(&self) -> &Repository;

    /// One page of PR numbers matching an issue search query
    async fn search_pull_requests(
        &self,
        query: &str,
        page: u32,
        per_page: u8,
    ) -> Result<PageResult<PrNumber>, ApiError>;

    /// One page of PR numbers across all states
    async fn list_pull_requests(
        &self,
        page: u32,
        per_page: u8,
    ) -> Result<PageResult<PrNumber>, ApiError>;

    /// Full PR object, kept as raw JSON
    async fn get_pull_request(&self, number: PrNumber) -> Result<serde_json::Value, ApiError>;

    async fn issue_comments(
        &self,
        number: PrNumber,
        page: u32,
        per_page: u8,
    ) -> Result<PageResult<RawIssueComment>, ApiError>;

    async fn review_comments(
        &self,
        number: PrNumber,
        page: u32,
        per_page: u8,
    ) -> Result<PageResult<RawReviewComment>, ApiError>;
}

/// Parse `owner/repo` or a GitHub URL such as `https://github.com/owner/repo.git`
pub fn parse_repository(input: &str) -> Result<Repository> {
    let trimmed = input.trim().trim_end_matches('/');
    let path = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .map(|rest| rest.strip_prefix("www.").unwrap_or(rest))
        .map(|rest| {
            rest.strip_prefix("github.com/")
                .ok_or_else(|| anyhow::anyhow!("Not a GitHub repository URL: {}", input))
        })
        .transpose()?
        .unwrap_or(trimmed);
    let path = path.strip_suffix(".git").unwrap_or(path);

    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!(
            "Invalid repository. Expected 'owner/repo' or a GitHub URL, got: {}",
            input
        );
    }

    Ok(Repository {
        owner: parts[0].to_string(),
        name: parts[1].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository() {
        let repo = parse_repository("octocat/hello-world").unwrap();
        assert_eq!(repo.owner, "octocat");
        assert_eq!(repo.name, "hello-world");
    }

    #[test]
    fn test_parse_repository_url() {
        for input in [
            "https://github.com/octocat/hello-world",
            "https://github.com/octocat/hello-world/",
            "https://github.com/octocat/hello-world.git",
            "http://www.github.com/octocat/hello-world",
        ] {
            let repo = parse_repository(input).unwrap();
            assert_eq!(repo.to_string(), "octocat/hello-world", "input: {input}");
        }
    }

    #[test]
    fn test_parse_repository_invalid() {
        assert!(parse_repository("invalid").is_err());
        assert!(parse_repository("too/many/parts").is_err());
        assert!(parse_repository("/repo").is_err());
        assert!(parse_repository("https://gitlab.com/owner/repo").is_err());
    }
}
