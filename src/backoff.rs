//! Retry backoff schedule for stream re-subscription
//!
//! The ramp is the load-shedding policy that keeps a fleet of dashboards from
//! hammering a failing backend: delays start at one second per attempt and grow
//! to several seconds as an outage persists. Retries fire at cumulative
//! 1, 2, 3, 5, 7, 10, 13, 18, 23, 31, 39, 52, 65, ... seconds.

use std::time::Duration;

/// Longest delay between two consecutive attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Delay before retry `attempt` (1-based).
///
/// Fibonacci pairs: 1, 1, 1, 2, 2, 3, 3, 5, 5, 8, 8, 13, 13, ... seconds,
/// capped at [`MAX_RETRY_DELAY`].
pub fn retry_delay(attempt: u32) -> Duration {
    debug_assert!(attempt >= 1, "attempts are 1-based");
    let step = attempt / 2 + 1;
    let cap = MAX_RETRY_DELAY.as_secs();
    let (mut prev, mut cur) = (1u64, 1u64); // fib(1), fib(2)
    for _ in 3..=step {
        let next = prev + cur;
        prev = cur;
        cur = next;
        if cur >= cap {
            break;
        }
    }
    Duration::from_secs(cur.min(cap))
}

/// Attempt counter for one subscription instance.
///
/// The counter is never reset while the instance lives; a deliberate
/// re-subscription (new instance) starts a fresh schedule.
#[derive(Debug, Default)]
pub struct RetrySchedule {
    attempt: u32,
}

impl RetrySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retries scheduled so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Advance to the next attempt and return its delay.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;
        retry_delay(self.attempt)
    }
}
