//! Per-attempt fetch error, classified before it is turned into outcome text.

use std::fmt;

/// Error from a single probe or fetch attempt.
#[derive(Debug)]
pub enum FetchError {
    /// Connect or transfer exceeded the per-request timeout.
    Timeout(String),
    /// Network-level failure (connection refused/reset, DNS, send/recv).
    Connection(String),
    /// Response had a non-2xx status.
    Http(u32),
    /// Source locator could not be parsed or uses an unsupported scheme.
    InvalidLocator(String),
    /// Server answered 2xx with no body.
    EmptyBody,
    /// Body ended before the advertised Content-Length.
    PartialTransfer { expected: u64, received: u64 },
    /// Writing the staged file failed (disk full, permission denied).
    Storage(std::io::Error),
    /// Run was cancelled or hit its deadline.
    Cancelled,
    /// Any other transport failure.
    Transport(String),
}

impl FetchError {
    /// Storage errors that will repeat for every task (disk full, read-only fs).
    pub fn is_environment_fatal(&self) -> bool {
        match self {
            FetchError::Storage(e) => crate::storage::is_environment_fatal(e),
            _ => false,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout(msg) if msg.is_empty() => write!(f, "timeout"),
            FetchError::Timeout(msg) => write!(f, "timeout: {}", msg),
            FetchError::Connection(msg) => write!(f, "connection: {}", msg),
            FetchError::Http(code) => write!(f, "HTTP {}", code),
            FetchError::InvalidLocator(msg) => write!(f, "invalid locator: {}", msg),
            FetchError::EmptyBody => write!(f, "empty body"),
            FetchError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            FetchError::Storage(e) => write!(f, "storage: {}", e),
            FetchError::Cancelled => write!(f, "cancelled"),
            FetchError::Transport(msg) => write!(f, "transport: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Storage(e) => Some(e),
            _ => None,
        }
    }
}
