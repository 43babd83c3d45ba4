//! Transport error types

use std::fmt;
use thiserror::Error;

/// Transport error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Http { status }, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::http(status.as_u16(), err.to_string()),
            None => Self::network(err.to_string()),
        }
    }
}

/// Where the stream broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connect failure, reset, timeout
    Network,
    /// Non-success HTTP status on the subscribe request
    Http { status: u16 },
    /// The agent answered with a JSON-RPC error
    Protocol,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Http { status } => write!(f, "http {status}"),
            Self::Protocol => f.write_str("protocol"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(TransportErrorKind::Network.to_string(), "network");
        assert_eq!(TransportErrorKind::Http { status: 503 }.to_string(), "http 503");
        assert_eq!(TransportErrorKind::Protocol.to_string(), "protocol");
    }

    #[test]
    fn test_display_is_the_message() {
        let err = TransportError::http(502, "bad gateway");
        assert_eq!(err.to_string(), "bad gateway");
        assert_eq!(err.kind, TransportErrorKind::Http { status: 502 });
    }
}
