use std::future::Future;
use std::time::Duration;

use tokio::time::interval;

use crate::dtos::negotiationdtos::NegotiationSnapshotDto;

/// Client-side fallback for the push channel: while a negotiation is being
/// agreed and no contract has shown up locally, re-read the authoritative
/// snapshot on a fixed cadence until it settles. Exists to close the window
/// between a missed realtime event and the next user-visible confirmation;
/// the underlying read is idempotent so calling it often is harmless.
#[derive(Debug, Clone)]
pub struct ReconciliationPoller {
    poll_interval: Duration,
    max_attempts: u32,
}

impl Default for ReconciliationPoller {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1500),
            max_attempts: 40,
        }
    }
}

impl ReconciliationPoller {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval,
            max_attempts,
        }
    }

    /// Polls `fetch` until the snapshot is settled (contract present or a
    /// terminal status), a bounded number of times. Returns `None` when the
    /// budget runs out without a settled snapshot; transient fetch errors
    /// consume an attempt and the loop keeps going.
    pub async fn poll_until_settled<F, Fut, E>(&self, fetch: F) -> Option<NegotiationSnapshotDto>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<NegotiationSnapshotDto, E>>,
        E: std::fmt::Display,
    {
        let mut ticker = interval(self.poll_interval);
        for attempt in 1..=self.max_attempts {
            ticker.tick().await;
            match fetch().await {
                Ok(snapshot) if snapshot.is_settled() => {
                    tracing::debug!("reconciliation settled after {} attempt(s)", attempt);
                    return Some(snapshot);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("reconciliation fetch failed on attempt {}: {}", attempt, e);
                }
            }
        }
        None
    }
}
