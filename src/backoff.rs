use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::info;

/// Fixed-duration waiter used while a provider rate limit cools down.
///
/// The wait is not reactive: it never polls the provider, it simply sleeps for the
/// requested duration and logs a heartbeat with the remaining time at every interval.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    heartbeat: Duration,
}

impl Backoff {
    pub fn new(heartbeat: Duration) -> Self {
        Self { heartbeat }
    }

    /// Block for `duration`, returning the number of heartbeats emitted
    pub async fn wait(&self, duration: Duration, reason: &str) -> u32 {
        info!(
            reason,
            wait = %format_duration(duration),
            "Rate limit hit, pausing before retry"
        );

        if self.heartbeat.is_zero() {
            sleep(duration).await;
            info!("Rate limit wait completed, resuming");
            return 0;
        }

        let start = Instant::now();
        let timer = sleep(duration);
        tokio::pin!(timer);

        let mut ticker = interval_at(start + self.heartbeat, self.heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut beats = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut timer => {
                    info!("Rate limit wait completed, resuming");
                    return beats;
                }
                _ = ticker.tick() => {
                    let remaining = duration.saturating_sub(start.elapsed());
                    if !remaining.is_zero() {
                        beats += 1;
                        info!(remaining = %format_duration(remaining), "Still waiting for rate limit");
                    }
                }
            }
        }
    }
}

/// Render a duration as `1h 5m`, `9m 30s` or `250ms`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }

    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (hours, minutes, seconds) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}
