use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::error::ApiError;
use crate::models::PageResult;
use crate::rate_limit::RateLimitPolicy;

/// Rate-limit handling for one provider: how to recognize throttling and how long to back off
#[derive(Debug)]
pub struct Throttle {
    policy: RateLimitPolicy,
    backoff: Backoff,
    wait: Duration,
    pauses: AtomicUsize,
}

impl Throttle {
    pub fn new(policy: RateLimitPolicy, backoff: Backoff, wait: Duration) -> Self {
        Self {
            policy,
            backoff,
            wait,
            pauses: AtomicUsize::new(0),
        }
    }

    pub fn is_rate_limited(&self, err: &ApiError) -> bool {
        self.policy.is_rate_limited(err)
    }

    /// Log the failure and block for the configured cool-down
    pub async fn pause(&self, err: &ApiError, what: &str) {
        let signal = self.policy.signal(err);
        warn!(error = %err, ?signal, what, "Rate limited");
        self.pauses.fetch_add(1, Ordering::Relaxed);
        self.backoff.wait(self.wait, what).await;
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Cool-downs taken so far
    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::Relaxed)
    }
}

/// Walk a paginated endpoint from page 1 to the last page.
///
/// With a throttle, a rate-limited page is retried after the cool-down until it
/// succeeds, with no cap on attempts. Without one, throttling propagates like any
/// other failure so the caller can checkpoint before waiting. Any non-throttling
/// failure aborts the walk and discards what was gathered.
pub async fn fetch_all_pages<T, F, Fut>(
    label: &str,
    per_page: u8,
    throttle: Option<&Throttle>,
    mut fetch_page: F,
) -> Result<Vec<T>, ApiError>
where
    F: FnMut(u32, u8) -> Fut,
    Fut: Future<Output = Result<PageResult<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut page = 1u32;
    let mut retries = 0u32;

    loop {
        debug!(label, page, per_page, "Fetching page");

        match fetch_page(page, per_page).await {
            Ok(result) => {
                let count = result.items.len();
                items.extend(result.items);
                debug!(label, page, count, total = items.len(), "Fetched page");

                match result.next_page {
                    Some(next) if next > page => page = next,
                    _ => break,
                }
            }
            Err(e) => match throttle {
                Some(throttle) if throttle.is_rate_limited(&e) => {
                    retries += 1;
                    throttle.pause(&e, label).await;
                    info!(label, page, retries, "Retrying page");
                }
                _ => return Err(e),
            },
        }
    }

    Ok(items)
}
