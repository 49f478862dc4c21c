//! Cooperative per-request time budget.
//!
//! A `TimeBudget` is polled before every expensive step. It never interrupts
//! a step that is already running: a single slow call can still overrun the
//! ceiling, and the next poll simply reports the budget as spent.

use std::time::{Duration, Instant};

/// Default ceiling, leaving margin inside a 180 second outer limit.
pub const DEFAULT_CEILING: Duration = Duration::from_secs(160);

/// Elapsed-time poll against a fixed ceiling.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    start: Instant,
    ceiling: Duration,
}

impl TimeBudget {
    /// Start a budget now.
    pub fn new(ceiling: Duration) -> Self {
        Self::starting_at(Instant::now(), ceiling)
    }

    /// Start a budget at an instant recorded by the caller (request arrival).
    pub fn starting_at(start: Instant, ceiling: Duration) -> Self {
        Self { start, ceiling }
    }

    /// True while elapsed time is strictly below the ceiling.
    pub fn remaining_ok(&self) -> bool {
        self.elapsed() < self.ceiling
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left before the ceiling, zero once spent.
    pub fn remaining(&self) -> Duration {
        self.ceiling.saturating_sub(self.elapsed())
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }
}

impl Default for TimeBudget {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_budget_is_ok() {
        let budget = TimeBudget::new(Duration::from_secs(60));
        assert!(budget.remaining_ok());
        assert!(budget.remaining() > Duration::from_secs(59));
    }

    #[test]
    fn test_zero_ceiling_is_spent_immediately() {
        let budget = TimeBudget::new(Duration::ZERO);
        assert!(!budget.remaining_ok());
        assert_eq!(budget.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_budget_expires_and_stays_expired() {
        let budget = TimeBudget::new(Duration::from_millis(20));
        assert!(budget.remaining_ok());

        std::thread::sleep(Duration::from_millis(30));
        for _ in 0..5 {
            assert!(!budget.remaining_ok());
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_external_start_instant() {
        let start = Instant::now();
        std::thread::sleep(Duration::from_millis(15));
        let budget = TimeBudget::starting_at(start, Duration::from_millis(10));
        assert!(!budget.remaining_ok());
        assert!(budget.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_default_ceiling() {
        assert_eq!(TimeBudget::default().ceiling(), Duration::from_secs(160));
    }
}
