use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use super::Batch;
use crate::backoff::{format_duration, Backoff};
use crate::config::Config;
use crate::fetch::{fetch_all_pages, Throttle};
use crate::github::comments::fetch_discussion;
use crate::github::PullRequestSource;
use crate::ledger::{JsonLedgerFile, ProgressLedger};
use crate::models::{ProcessOutcome, Repository, RunSummary};
use crate::output::{ensure_dir, keyword_dir_name, write_item_file};
use crate::rate_limit::RateLimitPolicy;

const LEDGER_FILE: &str = ".processed_prs.json";

/// `<data_dir>/<owner>/<repo>`
pub fn repository_dir(config: &Config, repo: &Repository) -> PathBuf {
    config.harvest.data_dir.join(&repo.owner).join(&repo.name)
}

pub fn search_query(repo: &Repository, qualifiers: &str, keyword: &str) -> String {
    let qualifiers = qualifiers.trim();
    if qualifiers.is_empty() {
        format!("repo:{repo} {keyword}")
    } else {
        format!("repo:{repo} {qualifiers} {keyword}")
    }
}

/// Search the repository for each keyword and save the discussion of every matching PR
/// to `<data_dir>/<owner>/<repo>/<keyword>/<pr>.json`.
pub async fn harvest_keywords<S: PullRequestSource + ?Sized>(
    source: &S,
    keywords: &[String],
    config: &Config,
) -> Result<RunSummary> {
    let repo = source.repository();
    let root = repository_dir(config, repo);
    ensure_dir(&root)?;

    let per_page = config.github.per_page;
    let throttle = Throttle::new(
        RateLimitPolicy::github(),
        Backoff::new(config.rate_limit.heartbeat()),
        config.rate_limit.search_wait(),
    );
    let ledger = ProgressLedger::load(
        JsonLedgerFile::new(root.join(LEDGER_FILE)),
        config.ledger.flush_threshold,
    )?;
    let mut batch = Batch::new(ledger, &throttle, config.ledger.checkpoint_every);

    info!(
        repo = %repo,
        keywords = keywords.len(),
        cool_down = %format_duration(throttle.wait()),
        "Starting keyword harvest"
    );

    for keyword in keywords {
        let query = search_query(repo, &config.github.search_qualifiers, keyword);
        let label = format!("search \"{keyword}\"");
        info!(keyword = %keyword, "Searching pull requests");

        let q = query.as_str();
        let numbers = match fetch_all_pages(&label, per_page, Some(&throttle), move |page, per_page| {
            source.search_pull_requests(q, page, per_page)
        })
        .await
        {
            Ok(numbers) => numbers,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "Search failed, moving on to next keyword");
                batch.record_error();
                continue;
            }
        };

        if numbers.is_empty() {
            info!(keyword = %keyword, "No pull requests found");
            continue;
        }

        info!(keyword = %keyword, count = numbers.len(), "Found pull requests");
        batch.record_fetched(numbers.len());

        let dir = root.join(keyword_dir_name(keyword));
        ensure_dir(&dir)?;

        for number in numbers {
            let outcome = batch
                .drive(number, move || fetch_discussion(source, number, per_page))
                .await?;

            if let ProcessOutcome::Success(discussion) = outcome {
                if let Err(e) = write_item_file(&dir, number, &discussion) {
                    batch.fail(number, format!("{e:#}"));
                    continue;
                }
                info!(
                    pr = number,
                    keyword = %keyword,
                    comments = discussion.comment_count(),
                    "Saved discussion"
                );
                batch.complete(number)?;
            }
        }

        batch.checkpoint()?;
    }

    batch.finish()
}
