//! Retry policy and backoff computation

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Maximum number of characters of a response body kept for diagnostics
pub const BODY_PREVIEW_LIMIT: usize = 500;

/// How often and how long to wait between attempts of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `backoff_factor * 2^(n-1)`
    pub backoff_factor: Duration,
    /// Exclusive upper bound of the uniform jitter added to computed delays
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_factor: Duration, max_jitter: Duration) -> Self {
        Self {
            max_retries,
            backoff_factor,
            max_jitter,
        }
    }

    /// Whether a transient failure on `attempt` (1-based) may be retried
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Exponential delay for `attempt` (1-based) without jitter
    pub fn computed_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.saturating_pow(exponent);
        self.backoff_factor.saturating_mul(factor)
    }

    /// Delay before the next attempt
    ///
    /// A server-provided `Retry-After` is used exactly; otherwise the
    /// exponential delay plus jitter.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(wait) => wait,
            None => self.computed_backoff(attempt).saturating_add(self.jitter()),
        }
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_secs_f64();
        if max <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..max))
    }
}

/// Numeric `Retry-After` header in seconds, clamped at zero
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds: f64 = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;

    if !seconds.is_finite() {
        return None;
    }
    Duration::try_from_secs_f64(seconds.max(0.0)).ok()
}

/// Shorten a response body for logs and error messages
pub fn body_preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{} …", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod retry_tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn policy(factor_ms: u64, jitter_ms: u64) -> RetryPolicy {
        RetryPolicy::new(
            5,
            Duration::from_millis(factor_ms),
            Duration::from_millis(jitter_ms),
        )
    }

    fn headers(retry_after: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(retry_after).unwrap());
        headers
    }

    #[test]
    fn test_should_retry_respects_budget() {
        let policy = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        let no_retries = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);
        assert!(!no_retries.should_retry(1));
    }

    #[test]
    fn test_computed_backoff_exponential() {
        let policy = policy(500, 0);
        assert_eq!(policy.computed_backoff(1), Duration::from_millis(500));
        assert_eq!(policy.computed_backoff(2), Duration::from_secs(1));
        assert_eq!(policy.computed_backoff(3), Duration::from_secs(2));
        assert_eq!(policy.computed_backoff(4), Duration::from_secs(4));
    }

    #[test]
    fn test_computed_backoff_is_monotonic() {
        let policy = policy(100, 0);
        let mut previous = Duration::ZERO;
        for attempt in 1..=64 {
            let delay = policy.computed_backoff(attempt);
            assert!(delay >= previous, "attempt {attempt} shrank the delay");
            previous = delay;
        }
    }

    #[test]
    fn test_delay_without_jitter_equals_computed() {
        let policy = policy(250, 0);
        for attempt in 1..=5 {
            assert_eq!(policy.delay(attempt, None), policy.computed_backoff(attempt));
        }
    }

    #[test]
    fn test_delay_jitter_bounds() {
        let policy = policy(100, 250);
        for _ in 0..200 {
            let delay = policy.delay(2, None);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(450));
        }
    }

    #[test]
    fn test_retry_after_takes_precedence() {
        let policy = policy(500, 250);
        for attempt in [1, 3, 10] {
            assert_eq!(
                policy.delay(attempt, Some(Duration::from_secs(7))),
                Duration::from_secs(7)
            );
        }
        assert_eq!(policy.delay(4, Some(Duration::ZERO)), Duration::ZERO);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(&headers("3")), Some(Duration::from_secs(3)));
        assert_eq!(
            parse_retry_after(&headers(" 1.5 ")),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(parse_retry_after(&headers("-4")), Some(Duration::ZERO));
        assert_eq!(
            parse_retry_after(&headers("Wed, 21 Oct 2015 07:28:00 GMT")),
            None
        );
        assert_eq!(parse_retry_after(&headers("NaN")), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn test_body_preview() {
        assert_eq!(body_preview("short", 500), "short");

        let long = "x".repeat(600);
        let preview = body_preview(&long, 500);
        assert_eq!(preview.chars().count(), 502);
        assert!(preview.ends_with(" …"));
        assert!(preview.starts_with(&"x".repeat(500)));

        let exact = "y".repeat(500);
        assert_eq!(body_preview(&exact, 500), exact);
    }

    #[test]
    fn test_body_preview_multibyte() {
        let text = "äöü".repeat(3);
        assert_eq!(body_preview(&text, 4), "äöüä …");
    }
}
