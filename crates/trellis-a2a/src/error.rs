//! A2A protocol error types.

use thiserror::Error;

/// Result type for A2A operations
pub type A2aResult<T> = Result<T, A2aError>;

/// Errors that can occur in A2A protocol operations
#[derive(Debug, Error)]
pub enum A2aError {
    /// Task not found
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// Task is in a terminal state and cannot be modified
    #[error("Task {task_id} is in terminal state: {state}")]
    TaskTerminated { task_id: String, state: String },

    /// Invalid task state transition
    #[error("Invalid state transition for task {task_id}: {from} -> {to}")]
    InvalidStateTransition {
        task_id: String,
        from: String,
        to: String,
    },

    /// Agent card validation failed
    #[error("Invalid agent card: {reason}")]
    InvalidAgentCard { reason: String },

    /// Message validation failed
    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    /// Authentication failed
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Unknown JSON-RPC method
    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    /// Malformed JSON-RPC params
    #[error("Invalid params: {reason}")]
    InvalidParams { reason: String },

    /// Connection error
    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    /// Request timeout
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Protocol error
    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    /// Streaming subscriber has gone away
    #[error("Subscriber closed for task {task_id}")]
    SubscriberClosed { task_id: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// HTTP error (when client feature is enabled)
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The caller canceled the operation
    #[error("Operation canceled")]
    Canceled,

    /// Internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl A2aError {
    /// Create a task not found error
    pub fn task_not_found(task_id: impl Into<String>) -> Self {
        Self::TaskNotFound {
            task_id: task_id.into(),
        }
    }

    /// Create a task terminated error
    pub fn task_terminated(task_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self::TaskTerminated {
            task_id: task_id.into(),
            state: state.into(),
        }
    }

    /// Create an invalid agent card error
    pub fn invalid_agent_card(reason: impl Into<String>) -> Self {
        Self::InvalidAgentCard {
            reason: reason.into(),
        }
    }

    /// Create an invalid message error
    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            reason: reason.into(),
        }
    }

    /// Create an invalid params error
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }

    /// Create a connection error
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            A2aError::ConnectionError { .. } | A2aError::Timeout { .. }
        )
    }
}

/// JSON-RPC error codes used on the wire.
///
/// Standard JSON-RPC 2.0 codes plus the A2A-reserved range.
pub mod codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// A2A: task not found
    pub const TASK_NOT_FOUND: i32 = -32001;
    /// A2A: task cannot be continued or canceled
    pub const TASK_NOT_CANCELABLE: i32 = -32002;
    /// A2A: authentication failed
    pub const AUTHENTICATION_FAILED: i32 = -32010;
}

/// JSON-RPC error object carried in responses
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Add data to the error response
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<A2aError> for ErrorResponse {
    fn from(err: A2aError) -> Self {
        let code = match &err {
            A2aError::TaskNotFound { .. } => codes::TASK_NOT_FOUND,
            A2aError::TaskTerminated { .. } | A2aError::InvalidStateTransition { .. } => {
                codes::TASK_NOT_CANCELABLE
            }
            A2aError::InvalidAgentCard { .. }
            | A2aError::InvalidMessage { .. }
            | A2aError::InvalidParams { .. } => codes::INVALID_PARAMS,
            A2aError::AuthenticationFailed { .. } => codes::AUTHENTICATION_FAILED,
            A2aError::MethodNotFound { .. } => codes::METHOD_NOT_FOUND,
            A2aError::SerializationError(_) => codes::PARSE_ERROR,
            A2aError::ProtocolError { .. } | A2aError::UrlError(_) => codes::INVALID_REQUEST,
            _ => codes::INTERNAL_ERROR,
        };

        ErrorResponse::new(code, err.to_string())
    }
}
