//! Fixed-delay retry around blocking external fetches.

use std::time::Duration;

use super::error::{ErrorClass, NewswatchError};

pub const DEFAULT_ATTEMPTS: u32 = 2;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

/// Run `op` up to `policy.attempts` times, sleeping `policy.delay` between
/// tries. Only upstream failures are retried. Exhaustion is reported as
/// [`NewswatchError::UpstreamUnavailable`].
pub fn with_fixed_retry<T, F>(
    source_name: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, NewswatchError>
where
    F: FnMut() -> Result<T, NewswatchError>,
{
    let attempts = policy.attempts.max(1);
    let mut last_reason = String::new();

    for attempt in 1..=attempts {
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(source = source_name, attempt, "fetch recovered on retry");
                }
                return Ok(value);
            }
            Err(e) if e.class() == ErrorClass::UpstreamUnavailable => {
                tracing::warn!(source = source_name, attempt, attempts, error = %e, "fetch failed");
                last_reason = e.to_string();
                if attempt < attempts && !policy.delay.is_zero() {
                    std::thread::sleep(policy.delay);
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(NewswatchError::UpstreamUnavailable {
        source_name: source_name.to_string(),
        attempts,
        reason: last_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> RetryPolicy {
        RetryPolicy::with_delay(Duration::ZERO)
    }

    fn fetch_error() -> NewswatchError {
        NewswatchError::Fetch {
            source_name: "feed".into(),
            reason: "timeout".into(),
        }
    }

    #[test]
    fn second_attempt_succeeds() {
        let mut calls = 0;
        let result = with_fixed_retry("feed", &instant(), || {
            calls += 1;
            if calls == 1 { Err(fetch_error()) } else { Ok(7) }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 2);
    }

    #[test]
    fn exhaustion_reports_upstream_unavailable() {
        let mut calls = 0;
        let result: Result<(), _> = with_fixed_retry("feed", &instant(), || {
            calls += 1;
            Err(fetch_error())
        });
        assert_eq!(calls, 2);
        match result.unwrap_err() {
            NewswatchError::UpstreamUnavailable {
                source_name,
                attempts,
                reason,
            } => {
                assert_eq!(source_name, "feed");
                assert_eq!(attempts, 2);
                assert!(reason.contains("timeout"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_upstream_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = with_fixed_retry("db", &instant(), || {
            calls += 1;
            Err(NewswatchError::Database {
                reason: "locked".into(),
            })
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(NewswatchError::Database { .. })));
    }

    #[test]
    fn defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 2);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }
}
