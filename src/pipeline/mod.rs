pub mod classify;
pub mod harvest;
pub mod listing;
pub mod strip;

pub use classify::classify_directory;
pub use harvest::harvest_keywords;
pub use listing::fetch_all_pulls;
pub use strip::{strip_directory, StripReport};

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::fetch::Throttle;
use crate::ledger::{LedgerStore, ProgressLedger};
use crate::models::{PrNumber, ProcessOutcome, RunSummary};

/// Drives a sequence of work items against a progress ledger.
///
/// Items already in the ledger are skipped. A rate-limited attempt checkpoints the
/// ledger, waits out the throttle and runs the same item again. Any other failure is
/// logged and counted, and the item stays eligible for the next run.
pub struct Batch<'a, S: LedgerStore> {
    ledger: ProgressLedger<S>,
    throttle: &'a Throttle,
    checkpoint_every: usize,
    since_checkpoint: usize,
    summary: RunSummary,
    started: Instant,
}

impl<'a, S: LedgerStore> Batch<'a, S> {
    pub fn new(ledger: ProgressLedger<S>, throttle: &'a Throttle, checkpoint_every: usize) -> Self {
        Self {
            ledger,
            throttle,
            checkpoint_every: checkpoint_every.max(1),
            since_checkpoint: 0,
            summary: RunSummary::default(),
            started: Instant::now(),
        }
    }

    pub fn ledger(&self) -> &ProgressLedger<S> {
        &self.ledger
    }

    /// Count items discovered by a search or listing
    pub fn record_fetched(&mut self, count: usize) {
        self.summary.fetched += count;
    }

    /// Count a failure that is not tied to a single item, such as a keyword search
    pub fn record_error(&mut self) {
        self.summary.errored += 1;
    }

    /// True (and counted as skipped) when the ledger already has `id`
    pub fn skip_if_done(&mut self, id: PrNumber) -> bool {
        if self.ledger.contains(id) {
            debug!(pr = id, "Already processed, skipping");
            self.summary.skipped += 1;
            true
        } else {
            false
        }
    }

    /// Run `attempt` for `id` until it succeeds or fails for a reason other than throttling
    pub async fn drive<T, F, Fut>(&mut self, id: PrNumber, mut attempt: F) -> Result<ProcessOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if self.skip_if_done(id) {
            return Ok(ProcessOutcome::Skipped);
        }

        loop {
            match self.outcome(attempt().await) {
                ProcessOutcome::RateLimited(err) => {
                    self.checkpoint()?;
                    self.throttle.pause(&err, &format!("PR #{id}")).await;
                    info!(pr = id, "Retrying PR");
                }
                ProcessOutcome::Failed(reason) => {
                    self.fail(id, &reason);
                    return Ok(ProcessOutcome::Failed(reason));
                }
                other => return Ok(other),
            }
        }
    }

    fn outcome<T>(&self, result: Result<T, ApiError>) -> ProcessOutcome<T> {
        match result {
            Ok(value) => ProcessOutcome::Success(value),
            Err(e) if self.throttle.is_rate_limited(&e) => ProcessOutcome::RateLimited(e),
            Err(e) => ProcessOutcome::Failed(e.to_string()),
        }
    }

    /// Record `id` as done, checkpointing every `checkpoint_every` successes
    pub fn complete(&mut self, id: PrNumber) -> Result<()> {
        self.ledger.add(id)?;
        self.summary.processed += 1;
        self.since_checkpoint += 1;

        if self.since_checkpoint >= self.checkpoint_every {
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Log and count a failed item without marking it done
    pub fn fail(&mut self, id: PrNumber, reason: impl Display) {
        warn!(pr = id, error = %reason, "Failed to process PR, will retry on next run");
        self.summary.errored += 1;
    }

    /// Persist buffered completions
    pub fn checkpoint(&mut self) -> Result<()> {
        self.since_checkpoint = 0;
        self.ledger.flush()
    }

    /// Final checkpoint and the counters of the run
    pub fn finish(mut self) -> Result<RunSummary> {
        self.checkpoint()?;
        self.summary.pauses = self.throttle.pauses();
        self.summary.elapsed = self.started.elapsed();

        info!(
            processed = self.summary.processed,
            skipped = self.summary.skipped,
            errored = self.summary.errored,
            ledger = self.ledger.len(),
            "Run complete"
        );

        Ok(self.summary)
    }
}
