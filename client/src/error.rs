//! Error types for the stream consumer.

use thiserror::Error;

/// Errors surfaced to stream subscribers.
///
/// Every transport error feeds the manager's backoff-reconnect path; the
/// `fatal` classification additionally decides whether reconnecting is
/// worthwhile at all (an endpoint that answers `403` will keep answering
/// `403`).
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// Establishing the connection failed (DNS, TCP, TLS).
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The server answered with a non-success status.
    #[error("Server returned HTTP {0}")]
    HttpStatus(u16),

    /// The connection broke while streaming.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A frame payload could not be decoded.
    #[error("Frame parse error: {0}")]
    Parse(String),
}

impl StreamError {
    /// Whether reconnecting cannot help (authentication/authorization or a
    /// missing endpoint).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::HttpStatus(401 | 403 | 404))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_fatal() {
        assert!(StreamError::HttpStatus(403).is_fatal());
        assert!(StreamError::HttpStatus(404).is_fatal());
        assert!(!StreamError::HttpStatus(500).is_fatal());
        assert!(!StreamError::Connect("refused".to_string()).is_fatal());
    }
}
