//! JSON-RPC request and response types for the A2A protocol.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Message, Task};
use crate::error::ErrorResponse;

/// JSON-RPC method: unary message send
pub const METHOD_MESSAGE_SEND: &str = "message/send";

/// JSON-RPC method: streaming message send (SSE response)
pub const METHOD_MESSAGE_STREAM: &str = "message/stream";

/// JSON-RPC method: fetch a task by ID
pub const METHOD_TASKS_GET: &str = "tasks/get";

/// JSON-RPC method: cancel a task
pub const METHOD_TASKS_CANCEL: &str = "tasks/cancel";

/// A JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always "2.0"
    pub jsonrpc: String,

    /// Request identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default)]
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    /// Create a request with a generated UUID id
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::Value::String(Uuid::new_v4().to_string())),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always "2.0"
    pub jsonrpc: String,

    /// Identifier of the request this answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,

    /// Successful result payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Error payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl JsonRpcResponse {
    /// Build a success response
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response
    pub fn error(id: Option<serde_json::Value>, error: ErrorResponse) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Parameters of `message/send` and `message/stream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendParams {
    /// The message to deliver
    pub message: Message,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MessageSendParams {
    /// Create params for a message
    pub fn new(message: Message) -> Self {
        Self {
            message,
            metadata: HashMap::new(),
        }
    }
}

/// Parameters of `tasks/get` and `tasks/cancel`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdParams {
    /// Task ID
    pub id: String,
}

/// Result of `message/send`: either a direct reply or a task handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SendMessageResult {
    /// A direct message reply
    #[serde(rename = "message")]
    Message(Message),

    /// A task accumulating the reply
    #[serde(rename = "task")]
    Task(Task),
}
