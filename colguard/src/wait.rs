//! Poll-with-timeout primitive for eventually consistent server state.
//!
//! Policy changes propagate to the key service asynchronously. Instead of
//! sleeping a fixed time, callers probe until a condition holds or the
//! timeout elapses, and get an explicit outcome either way.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Backoff schedule for [`wait_until`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    pub timeout: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl PollConfig {
    /// Doubles the interval after every failed probe, capped at ten times the
    /// initial interval.
    #[must_use]
    pub fn new(timeout: Duration, initial_interval: Duration) -> Self {
        Self { timeout, initial_interval, max_interval: initial_interval.saturating_mul(10), multiplier: 2.0 }
    }

    #[must_use]
    pub const fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier.max(1.0))
            .map_or(self.max_interval, |next| next.min(self.max_interval))
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The probe returned true
    Satisfied { attempts: u32, elapsed: Duration },
    /// The timeout elapsed first
    TimedOut { attempts: u32, elapsed: Duration },
}

impl WaitOutcome {
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Satisfied { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }
}

/// Runs `probe` until it returns true or `config.timeout` elapses.
///
/// The probe runs at least once, immediately. Sleeps never overshoot the
/// deadline, and a final probe runs at the deadline. A timeout too large to
/// represent as an instant means no deadline.
pub async fn wait_until<F, Fut>(config: &PollConfig, mut probe: F) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let deadline = start.checked_add(config.timeout);
    let mut interval = config.initial_interval;
    let mut attempts = 0;

    loop {
        attempts += 1;
        if probe().await {
            return WaitOutcome::Satisfied { attempts, elapsed: start.elapsed() };
        }

        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return WaitOutcome::TimedOut { attempts, elapsed: start.elapsed() };
                }
                interval.min(deadline - now)
            }
            None => interval,
        };
        debug!("condition not met after {attempts} attempt(s), retrying in {pause:?}");
        sleep(pause).await;
        interval = config.next_interval(interval);
    }
}
