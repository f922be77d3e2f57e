//! Randomized, cancellable delay between consecutive sends

use crate::config::CampaignLimits;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceOutcome {
    Elapsed,
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    /// Bounds are swapped if given in the wrong order
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_limits(limits: &CampaignLimits) -> Self {
        Self::new(limits.min_send_interval(), limits.max_send_interval())
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    /// Uniform draw in `[min, max]`
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let millis = rand::thread_rng().gen_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(millis as u64)
    }

    /// Sleep for one drawn delay, returning early on cancellation
    pub async fn pace(&self, cancel: &CancellationToken) -> PaceOutcome {
        if cancel.is_cancelled() {
            return PaceOutcome::Cancelled;
        }

        let delay = self.next_delay();
        log::info!("Waiting {:.0}s before next send", delay.as_secs_f64());

        tokio::select! {
            _ = cancel.cancelled() => PaceOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => PaceOutcome::Elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_stay_within_bounds() {
        let pacer = Pacer::new(Duration::from_secs(240), Duration::from_secs(300));
        for _ in 0..500 {
            let delay = pacer.next_delay();
            assert!(delay >= Duration::from_secs(240));
            assert!(delay <= Duration::from_secs(300));
        }
    }

    #[test]
    fn test_reversed_bounds_are_normalized() {
        let pacer = Pacer::new(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(pacer.bounds(), (Duration::from_secs(1), Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_elapses() {
        let pacer = Pacer::new(Duration::from_secs(240), Duration::from_secs(300));
        let started = tokio::time::Instant::now();
        let outcome = pacer.pace(&CancellationToken::new()).await;
        assert_eq!(outcome, PaceOutcome::Elapsed);
        assert!(started.elapsed() >= Duration::from_secs(240));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_cancels_immediately() {
        let pacer = Pacer::new(Duration::from_secs(240), Duration::from_secs(300));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        assert_eq!(pacer.pace(&token).await, PaceOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(240));
    }

    #[tokio::test]
    async fn test_pace_on_cancelled_token_returns_at_once() {
        let pacer = Pacer::new(Duration::from_secs(240), Duration::from_secs(300));
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(pacer.pace(&token).await, PaceOutcome::Cancelled);
    }
}
