//! Map fetch errors and HTTP statuses onto retry policy error kinds.

use super::error::FetchError;
use super::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        408 => ErrorKind::Timeout,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a fetch error into an ErrorKind.
pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Timeout(_) => ErrorKind::Timeout,
        FetchError::Connection(_) => ErrorKind::Connection,
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::EmptyBody | FetchError::PartialTransfer { .. } => ErrorKind::Integrity,
        FetchError::InvalidLocator(_)
        | FetchError::Storage(_)
        | FetchError::Cancelled
        | FetchError::Transport(_) => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(matches!(classify_http_status(500), ErrorKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), ErrorKind::Http5xx(502)));
    }

    #[test]
    fn http_4xx_other() {
        assert_eq!(classify_http_status(404), ErrorKind::Other);
        assert_eq!(classify_http_status(403), ErrorKind::Other);
        assert_eq!(classify_http_status(408), ErrorKind::Timeout);
    }

    #[test]
    fn integrity_errors_are_transient() {
        assert_eq!(classify(&FetchError::EmptyBody), ErrorKind::Integrity);
        assert_eq!(
            classify(&FetchError::PartialTransfer { expected: 10, received: 3 }),
            ErrorKind::Integrity
        );
    }

    #[test]
    fn permanent_errors() {
        assert_eq!(classify(&FetchError::InvalidLocator("x".into())), ErrorKind::Other);
        assert_eq!(classify(&FetchError::Cancelled), ErrorKind::Other);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(classify(&FetchError::Storage(io)), ErrorKind::Other);
    }
}
