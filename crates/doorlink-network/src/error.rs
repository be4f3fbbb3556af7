//! Error types for the transport session.
//!
//! Failures are reported to the requester of the affected command and
//! never tear down the session: a lost or malformed datagram must not
//! disturb other observers or other in-flight commands.

use doorlink_core::{CorrelationId, ModuleId};
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while bridging commands to the hub.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Datagram could not be sent at the OS/network layer.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Send failure reported through a requester sink.
    #[error("Send failed for command {correlation_id} to {module}: {message}")]
    SendFailed {
        module: ModuleId,
        correlation_id: CorrelationId,
        message: String,
    },

    /// No FEEDBACK arrived within the reply window.
    #[error("No FEEDBACK from hub for command {correlation_id} to {module}")]
    Timeout {
        module: ModuleId,
        correlation_id: CorrelationId,
    },

    /// An id was registered twice. Indicates an id allocation bug.
    #[error("Correlation id {0} is already pending")]
    DuplicateCorrelationId(CorrelationId),

    /// The session stopped before the reply could be delivered.
    #[error("Session closed")]
    SessionClosed,

    /// Malformed command or protocol data.
    #[error("Protocol error: {0}")]
    Protocol(doorlink_core::Error),

    /// Invalid session configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<doorlink_core::Error> for SessionError {
    fn from(err: doorlink_core::Error) -> Self {
        match err {
            doorlink_core::Error::Io(e) => Self::Transport(e),
            other => Self::Protocol(other),
        }
    }
}

impl SessionError {
    /// Whether the failure was a reply timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_io_error_maps_to_transport() {
        let err: SessionError =
            doorlink_core::Error::Io(std::io::Error::other("unreachable")).into();
        assert!(matches!(err, SessionError::Transport(_)));
    }

    #[test]
    fn test_timeout_display() {
        let err = SessionError::Timeout {
            module: ModuleId::new("D2").unwrap(),
            correlation_id: CorrelationId::new(7),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "No FEEDBACK from hub for command 7 to D2");
    }
}
