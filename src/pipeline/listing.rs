use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use super::harvest::repository_dir;
use super::Batch;
use crate::backoff::{format_duration, Backoff};
use crate::config::Config;
use crate::fetch::{fetch_all_pages, Throttle};
use crate::github::PullRequestSource;
use crate::ledger::{JsonLedgerFile, ProgressLedger};
use crate::models::{ProcessOutcome, RunSummary};
use crate::output::{ensure_dir, write_item_file};
use crate::rate_limit::RateLimitPolicy;

const LEDGER_FILE: &str = ".fetched_prs.json";

/// List every PR of the repository and save each one's full detail to
/// `<data_dir>/<owner>/<repo>/pulls/<pr>.json`.
///
/// A listing failure other than throttling aborts the run.
pub async fn fetch_all_pulls<S: PullRequestSource + ?Sized>(
    source: &S,
    config: &Config,
) -> Result<RunSummary> {
    let repo = source.repository();
    let dir = repository_dir(config, repo).join("pulls");
    ensure_dir(&dir)?;

    let throttle = Throttle::new(
        RateLimitPolicy::github(),
        Backoff::new(config.rate_limit.heartbeat()),
        config.rate_limit.listing_wait(),
    );
    let ledger = ProgressLedger::load(
        JsonLedgerFile::new(dir.join(LEDGER_FILE)),
        config.ledger.flush_threshold,
    )?;
    let mut batch = Batch::new(ledger, &throttle, config.ledger.checkpoint_every);

    info!(repo = %repo, "Listing all pull requests");
    let listing_started = Instant::now();

    let numbers = fetch_all_pages(
        "pull request listing",
        config.github.per_page,
        Some(&throttle),
        move |page, per_page| source.list_pull_requests(page, per_page),
    )
    .await
    .with_context(|| format!("Failed to list pull requests of {repo}"))?;

    info!(
        count = numbers.len(),
        took = %format_duration(listing_started.elapsed()),
        "Listed pull requests"
    );
    batch.record_fetched(numbers.len());

    let saving_started = Instant::now();
    for number in numbers {
        let outcome = batch
            .drive(number, move || source.get_pull_request(number))
            .await?;

        if let ProcessOutcome::Success(detail) = outcome {
            if let Err(e) = write_item_file(&dir, number, &detail) {
                batch.fail(number, format!("{e:#}"));
                continue;
            }
            info!(pr = number, "Saved pull request");
            batch.complete(number)?;
        }
    }

    info!(took = %format_duration(saving_started.elapsed()), "Saved pull request details");

    batch.finish()
}
