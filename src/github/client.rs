use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::{Octocrab, Page};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{PullRequestSource, RawIssueComment, RawReviewComment};
use crate::error::ApiError;
use crate::models::{PageResult, PrNumber, Repository};

/// GitHub API client bound to one repository
pub struct GitHubClient {
    client: Octocrab,
    repo: Repository,
}

#[derive(Debug, Serialize)]
struct PageQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    per_page: u8,
    page: u32,
}

impl<'a> PageQuery<'a> {
    fn new(page: u32, per_page: u8) -> Self {
        Self {
            q: None,
            state: None,
            per_page,
            page,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    number: PrNumber,
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PullSummary {
    number: PrNumber,
}

impl GitHubClient {
    /// Create a client; without a token requests are anonymous and heavily rate limited
    pub fn new(token: Option<&str>, repo: Repository) -> Result<Self> {
        Self::build(token, repo, None)
    }

    /// Create a client against a different API root (GitHub Enterprise, test servers)
    pub fn with_base_uri(token: Option<&str>, repo: Repository, base_uri: &str) -> Result<Self> {
        Self::build(token, repo, Some(base_uri))
    }

    fn build(token: Option<&str>, repo: Repository, base_uri: Option<&str>) -> Result<Self> {
        let token = usable_token(token);
        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token.to_string());
        }
        if let Some(uri) = base_uri {
            builder = builder
                .base_uri(uri)
                .with_context(|| format!("Invalid GitHub API base URI: {uri}"))?;
        }

        let client = builder.build().context("Failed to create GitHub client")?;

        info!(repo = %repo, authenticated = token.is_some(), "Initialized GitHub client");

        Ok(Self { client, repo })
    }

    fn repo_route(&self, suffix: &str) -> String {
        format!("/repos/{}/{}/{}", self.repo.owner, self.repo.name, suffix)
    }

    async fn get_page<T>(
        &self,
        route: String,
        query: &PageQuery<'_>,
    ) -> Result<PageResult<T>, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let page: Page<T> = self.client.get(&route, Some(query)).await?;
        let next_page = page
            .next
            .as_ref()
            .map(|link| next_page_number(&link.to_string(), query.page));

        debug!(
            route = %route,
            page = query.page,
            count = page.items.len(),
            has_next = next_page.is_some(),
            "Fetched GitHub page"
        );

        Ok(PageResult {
            items: page.items,
            next_page,
        })
    }
}

/// A blank token means anonymous access
fn usable_token(token: Option<&str>) -> Option<&str> {
    token.map(str::trim).filter(|t| !t.is_empty())
}

/// Page number from a `rel="next"` link, falling back to the page after `current`
fn next_page_number(link: &str, current: u32) -> u32 {
    link.split_once('?')
        .map(|(_, query)| query)
        .into_iter()
        .flat_map(|query| query.split('&'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "page")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(current + 1)
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    fn repository(&self) -> &Repository {
        &self.repo
    }

    async fn search_pull_requests(
        &self,
        query: &str,
        page: u32,
        per_page: u8,
    ) -> Result<PageResult<PrNumber>, ApiError> {
        let params = PageQuery {
            q: Some(query),
            ..PageQuery::new(page, per_page)
        };
        let result: PageResult<SearchItem> =
            self.get_page("/search/issues".to_string(), &params).await?;

        Ok(PageResult {
            items: result
                .items
                .into_iter()
                .filter(|item| item.pull_request.is_some())
                .map(|item| item.number)
                .collect(),
            next_page: result.next_page,
        })
    }

    async fn list_pull_requests(
        &self,
        page: u32,
        per_page: u8,
    ) -> Result<PageResult<PrNumber>, ApiError> {
        let params = PageQuery {
            state: Some("all"),
            ..PageQuery::new(page, per_page)
        };
        let result: PageResult<PullSummary> =
            self.get_page(self.repo_route("pulls"), &params).await?;

        Ok(PageResult {
            items: result.items.into_iter().map(|pr| pr.number).collect(),
            next_page: result.next_page,
        })
    }

    async fn get_pull_request(&self, number: PrNumber) -> Result<serde_json::Value, ApiError> {
        let route = self.repo_route(&format!("pulls/{number}"));
        let pr: serde_json::Value = self.client.get(&route, None::<&()>).await?;
        Ok(pr)
    }

    async fn issue_comments(
        &self,
        number: PrNumber,
        page: u32,
        per_page: u8,
    ) -> Result<PageResult<RawIssueComment>, ApiError> {
        let route = self.repo_route(&format!("issues/{number}/comments"));
        self.get_page(route, &PageQuery::new(page, per_page)).await
    }

    async fn review_comments(
        &self,
        number: PrNumber,
        page: u32,
        per_page: u8,
    ) -> Result<PageResult<RawReviewComment>, ApiError> {
        let route = self.repo_route(&format!("pulls/{number}/comments"));
        self.get_page(route, &PageQuery::new(page, per_page)).await
    }
}
