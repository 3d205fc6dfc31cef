//! Events emitted by local agents while processing an invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;
use crate::registry;

/// One step in an agent's output stream: a content delta, a tool call or
/// result, an error, or the completion marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: String,

    /// Invocation this event belongs to
    #[serde(default)]
    pub invocation_id: String,

    /// Name of the agent that produced the event
    #[serde(default)]
    pub author: String,

    /// When the event was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Model response payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

impl Event {
    /// Create an event carrying a response.
    pub fn new(invocation_id: impl Into<String>, author: impl Into<String>, response: Response) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            invocation_id: invocation_id.into(),
            author: author.into(),
            timestamp: Some(Utc::now()),
            response: Some(response),
        }
    }

    /// Create an event whose response carries only an error.
    pub fn error(
        invocation_id: impl Into<String>,
        author: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            invocation_id,
            author,
            Response {
                error: Some(ResponseError {
                    message: message.into(),
                }),
                done: true,
                ..Default::default()
            },
        )
    }

    /// Check whether any choice requests a tool call, answers one, or
    /// carries the tool role, in either its message or its delta.
    pub fn is_tool_call(&self) -> bool {
        self.response.as_ref().is_some_and(|r| {
            r.choices
                .iter()
                .any(|c| c.message.is_tool_related() || c.delta.is_tool_related())
        })
    }

    /// Check whether this event terminates a streaming reply: done, and not
    /// part of a tool exchange.
    pub fn is_final_streaming(&self) -> bool {
        self.response.as_ref().is_some_and(|r| r.done) && !self.is_tool_call()
    }

    /// Check whether the event carries anything worth forwarding: message or
    /// delta content, or tool activity.
    pub fn has_content(&self) -> bool {
        self.response.as_ref().is_some_and(|r| {
            r.choices.iter().any(|c| {
                !c.message.content.is_empty()
                    || !c.delta.content.is_empty()
                    || c.message.is_tool_related()
                    || c.delta.is_tool_related()
            })
        })
    }
}

/// Model response carried on an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response identifier
    #[serde(default)]
    pub id: String,

    /// Object kind, e.g. `chat.completion` or `chat.completion.chunk`
    #[serde(default)]
    pub object: String,

    /// Creation timestamp, seconds since the epoch
    #[serde(default)]
    pub created: i64,

    /// Model that produced the response
    #[serde(default)]
    pub model: String,

    /// Response alternatives; the first choice is the canonical one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,

    /// Token accounting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Error reported by the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,

    /// Whether this is the last response of the invocation
    #[serde(default)]
    pub done: bool,

    /// Whether this response is a partial chunk of a streamed reply
    #[serde(default)]
    pub is_partial: bool,
}

impl Response {
    /// Context-window size of the producing model, when registered.
    pub fn context_window(&self) -> Option<u32> {
        registry::model_context_window(&self.model)
    }
}

/// One response alternative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Position of this choice
    #[serde(default)]
    pub index: u32,

    /// Accumulated message for unary replies
    #[serde(default)]
    pub message: Message,

    /// Incremental content for streamed replies
    #[serde(default)]
    pub delta: Message,

    /// Why generation stopped, when it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Token accounting for a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u32,
}

/// Error reported inside a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Human-readable description
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Role, ToolCall};

    fn content_event(content: &str, done: bool) -> Event {
        Event::new(
            "inv-1",
            "agent",
            Response {
                choices: vec![Choice {
                    message: Message::assistant(content),
                    ..Default::default()
                }],
                done,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_is_tool_call_on_message_and_delta() {
        let mut event = content_event("hi", false);
        assert!(!event.is_tool_call());

        event
            .response
            .as_mut()
            .unwrap()
            .choices[0]
            .delta
            .tool_calls
            .push(ToolCall {
                id: "c-1".to_string(),
                name: "search".to_string(),
                arguments: serde_json::Value::Null,
            });
        assert!(event.is_tool_call());

        let event = Event::new(
            "inv-1",
            "agent",
            Response {
                choices: vec![Choice {
                    message: Message {
                        role: Some(Role::Tool),
                        ..Default::default()
                    },
                    ..Default::default()
                }],
                ..Default::default()
            },
        );
        assert!(event.is_tool_call());
    }

    #[test]
    fn test_is_final_streaming() {
        assert!(content_event("done", true).is_final_streaming());
        assert!(!content_event("partial", false).is_final_streaming());

        let mut tool_done = content_event("", true);
        tool_done.response.as_mut().unwrap().choices[0].message.tool_id =
            Some("c-1".to_string());
        assert!(!tool_done.is_final_streaming());
    }

    #[test]
    fn test_has_content() {
        assert!(content_event("text", false).has_content());

        let empty = content_event("", false);
        assert!(!empty.has_content());

        let mut delta = content_event("", false);
        delta.response.as_mut().unwrap().choices[0].delta.content = "chunk".to_string();
        assert!(delta.has_content());
    }

    #[test]
    fn test_event_without_response_has_no_content() {
        let event = Event {
            id: "e-1".to_string(),
            ..Default::default()
        };
        assert!(!event.has_content());
        assert!(!event.is_tool_call());
        assert!(!event.is_final_streaming());
    }

    #[test]
    fn test_error_event() {
        let event = Event::error("inv-1", "agent", "backend exploded");
        let response = event.response.unwrap();
        assert_eq!(response.error.unwrap().message, "backend exploded");
        assert!(response.done);
    }
}
