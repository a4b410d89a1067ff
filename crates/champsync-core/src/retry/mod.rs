//! Retry and backoff policy.
//!
//! Error classification (timeouts, throttling, connection failures, truncated
//! bodies) and exponential backoff decisions, testable without any network I/O.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, Attempted};
