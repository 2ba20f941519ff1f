//! Transport error types.

use callkit_core::error::InvokeError;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The client was closed while the call was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Transport is not connected.
    #[error("Not connected")]
    NotConnected,

    /// A message had an unexpected type or shape.
    #[error("Invalid message: {message}")]
    InvalidMessage {
        /// Description of the problem.
        message: String,
    },

    /// Protocol error.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The peer does not implement the method.
    #[error("Method not implemented: {method}")]
    Unimplemented {
        /// The method that was called.
        method: String,
    },

    /// The peer handled the call and reported a failure.
    #[error("Remote error: {message}")]
    Remote {
        /// Message reported by the peer.
        message: String,
    },

    /// Timeout occurred.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long the operation waited.
        duration: std::time::Duration,
    },

    /// The caller cancelled the operation.
    #[error("{operation} was cancelled")]
    Cancelled {
        /// The operation that was cancelled.
        operation: String,
    },

    /// Configuration could not be read from the endpoint.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl TransportError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an invalid message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a remote error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Connection { .. } | Self::NotConnected => TransportErrorKind::ConnectionFailed,
            Self::ConnectionClosed => TransportErrorKind::ConnectionClosed,
            Self::InvalidMessage { .. } => TransportErrorKind::InvalidMessage,
            Self::Protocol { .. } | Self::Config { .. } => TransportErrorKind::ProtocolViolation,
            Self::Unimplemented { .. } => TransportErrorKind::Unimplemented,
            Self::Remote { .. } => TransportErrorKind::Remote,
            Self::Timeout { .. } => TransportErrorKind::Timeout,
            Self::Cancelled { .. } => TransportErrorKind::Cancelled,
        }
    }
}

/// Classification of transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection could not be established or is not established.
    ConnectionFailed,
    /// Connection was closed.
    ConnectionClosed,
    /// Message format was invalid.
    InvalidMessage,
    /// Protocol violation detected.
    ProtocolViolation,
    /// The method is unknown to the peer.
    Unimplemented,
    /// The peer reported a failure.
    Remote,
    /// Operation timed out.
    Timeout,
    /// Operation was cancelled by the caller.
    Cancelled,
}

impl TransportErrorKind {
    /// Short lowercase name, used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionFailed => "unavailable",
            Self::ConnectionClosed => "closed",
            Self::InvalidMessage => "invalid-message",
            Self::ProtocolViolation => "protocol",
            Self::Unimplemented => "unimplemented",
            Self::Remote => "remote",
            Self::Timeout => "deadline-exceeded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TransportError> for InvokeError {
    fn from(err: TransportError) -> Self {
        Self::transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            TransportError::NotConnected.kind(),
            TransportErrorKind::ConnectionFailed
        );
        assert_eq!(
            TransportError::Timeout {
                operation: "unary".to_string(),
                duration: std::time::Duration::from_secs(1),
            }
            .kind(),
            TransportErrorKind::Timeout
        );
        assert_eq!(TransportErrorKind::Timeout.to_string(), "deadline-exceeded");
        assert_eq!(
            TransportError::Unimplemented {
                method: "Nope".to_string()
            }
            .kind()
            .to_string(),
            "unimplemented"
        );
    }

    #[test]
    fn test_invoke_error_conversion_keeps_error() {
        let err = TransportError::remote("quota exceeded");
        let invoke_err: InvokeError = err.clone().into();

        assert_eq!(invoke_err.transport_source::<TransportError>(), Some(&err));
        assert!(!invoke_err.is_unavailable());
    }
}
