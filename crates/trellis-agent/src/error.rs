//! Error types for the agent bridge.

use thiserror::Error;

/// Result type for bridge operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that can occur when bridging agents to the A2A protocol.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid or missing configuration; raised before any work starts.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// User identity missing from the request context.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Malformed request or reply at the protocol level.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A converter refused its input.
    #[error("Conversion failed for {id}: {reason}")]
    Conversion { id: String, reason: String },

    /// The backend agent reported an error in its response.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Transport-level failure: connection, HTTP status, or read error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller canceled the operation.
    #[error("Operation canceled")]
    Canceled,

    /// Wire-layer error.
    #[error("A2A error: {0}")]
    A2a(#[from] trellis_a2a::A2aError),
}

impl AgentError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a conversion error tagged with the offending event or message ID.
    pub fn conversion(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an agent error.
    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent(message.into())
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Check whether this error is a cancellation, so callers can tell
    /// cancellation apart from failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, AgentError::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::config("agent is required");
        assert_eq!(err.to_string(), "Invalid configuration: agent is required");

        let err = AgentError::conversion("event-1", "no choices");
        assert_eq!(err.to_string(), "Conversion failed for event-1: no choices");
    }

    #[test]
    fn test_canceled_is_distinguished() {
        assert!(AgentError::Canceled.is_canceled());
        assert!(!AgentError::agent("boom").is_canceled());
    }

    #[test]
    fn test_a2a_error_wraps() {
        let err: AgentError = trellis_a2a::A2aError::task_not_found("t-1").into();
        assert!(matches!(err, AgentError::A2a(_)));
        assert!(err.to_string().contains("t-1"));
    }
}
