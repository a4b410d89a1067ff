//! Retry loop: run a closure until success, a permanent error, or policy exhaustion.

use std::time::Duration;

use super::classify::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::RunControl;

/// Final result of a retried operation plus what it cost.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, FetchError>,
    /// Attempts actually made (0 if cancelled before the first one).
    pub attempts: u32,
    /// Backoff delays slept between attempts, in order.
    pub delays: Vec<Duration>,
}

/// Runs `f(attempt)` until it succeeds or the retry policy says to stop.
/// Backoff sleeps wake early when `control` is cancelled.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, control: &RunControl, mut f: F) -> Attempted<T>
where
    F: FnMut(u32) -> Result<T, FetchError>,
{
    let mut attempt = 1u32;
    let mut delays = Vec::new();
    loop {
        if control.is_cancelled() {
            return Attempted {
                result: Err(FetchError::Cancelled),
                attempts: attempt - 1,
                delays,
            };
        }
        match f(attempt) {
            Ok(v) => {
                return Attempted {
                    result: Ok(v),
                    attempts: attempt,
                    delays,
                }
            }
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        return Attempted {
                            result: Err(e),
                            attempts: attempt,
                            delays,
                        }
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(attempt, ?kind, delay_ms = d.as_millis() as u64, "retrying: {}", e);
                        delays.push(d);
                        if !control.sleep(d) {
                            return Attempted {
                                result: Err(FetchError::Cancelled),
                                attempts: attempt,
                                delays,
                            };
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}
