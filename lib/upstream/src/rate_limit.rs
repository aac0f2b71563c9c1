use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;
use tracing::warn;

/// Reset delays above this threshold fail fast instead of sleeping.
const MAX_SLEEP_SECONDS: u64 = 60;

/// What the client should do before sending a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    Proceed,
    /// Sleep this long, then send.
    SleepFor(Duration),
    /// Budget exhausted and the reset is too far away to wait for.
    Exhausted { reset_in_seconds: u64 },
}

/// Local accounting of the upstream's hourly request budget.
///
/// `remaining` and `reset_at` track the most recent `X-RateLimit-*` headers;
/// between responses the state is assumed authoritative.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub remaining: u32,
    /// Unix timestamp (seconds) at which the budget resets.
    pub reset_at: u64,
    pub hourly_quota: u32,
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl RateLimitState {
    pub fn new(hourly_quota: u32) -> Self {
        Self {
            remaining: hourly_quota,
            reset_at: now_unix() + 3600,
            hourly_quota,
        }
    }

    /// Decide whether a request may be sent at `now`.
    ///
    /// A reset timestamp that is not strictly in the future restores the
    /// full quota immediately, so a request arriving exactly at the reset
    /// instant proceeds without sleeping.
    pub fn before_send(&mut self, now: u64) -> BudgetDecision {
        if self.remaining > 0 {
            return BudgetDecision::Proceed;
        }

        if self.reset_at > now {
            let delay = self.reset_at - now;
            if delay > MAX_SLEEP_SECONDS {
                return BudgetDecision::Exhausted {
                    reset_in_seconds: delay,
                };
            }
            warn!("Rate limit reached, delaying for {} seconds", delay);
            // Small buffer past the reset instant.
            return BudgetDecision::SleepFor(Duration::from_secs(delay + 1));
        }

        self.remaining = self.hourly_quota;
        self.reset_at = now + 3600;
        BudgetDecision::Proceed
    }

    /// Fold `X-RateLimit-Remaining` / `X-RateLimit-Reset` headers into the
    /// local state. Absent or malformed headers leave the state untouched.
    pub fn record_response(&mut self, headers: &HeaderMap) {
        if let Some(remaining) = headers
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        {
            self.remaining = remaining;
        }

        if let Some(reset_at) = headers
            .get("X-RateLimit-Reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.reset_at = reset_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proceeds_while_budget_remains() {
        let mut state = RateLimitState::new(10);
        assert_eq!(state.before_send(now_unix()), BudgetDecision::Proceed);
    }

    #[test]
    fn sleeps_for_short_resets() {
        let now = now_unix();
        let mut state = RateLimitState::new(10);
        state.remaining = 0;
        state.reset_at = now + 30;
        assert_eq!(
            state.before_send(now),
            BudgetDecision::SleepFor(Duration::from_secs(31))
        );
    }

    #[test]
    fn fails_fast_for_long_resets() {
        let now = now_unix();
        let mut state = RateLimitState::new(10);
        state.remaining = 0;
        state.reset_at = now + 120;
        assert_eq!(
            state.before_send(now),
            BudgetDecision::Exhausted {
                reset_in_seconds: 120
            }
        );
    }

    #[test]
    fn reset_exactly_now_restores_quota_without_sleep() {
        let now = now_unix();
        let mut state = RateLimitState::new(10);
        state.remaining = 0;
        state.reset_at = now;
        assert_eq!(state.before_send(now), BudgetDecision::Proceed);
        assert_eq!(state.remaining, 10);
        assert!(state.reset_at > now);
    }

    #[test]
    fn headers_override_local_state() {
        let mut state = RateLimitState::new(10);
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Remaining", "42".parse().unwrap());
        headers.insert("X-RateLimit-Reset", "1700000000".parse().unwrap());
        state.record_response(&headers);
        assert_eq!(state.remaining, 42);
        assert_eq!(state.reset_at, 1_700_000_000);
    }

    #[test]
    fn malformed_headers_are_ignored() {
        let mut state = RateLimitState::new(10);
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Remaining", "not-a-number".parse().unwrap());
        state.record_response(&headers);
        assert_eq!(state.remaining, 10);
    }
}
