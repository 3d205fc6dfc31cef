//! Bidirectional conversion between internal messages/events and A2A wire
//! forms.
//!
//! Each direction is a replaceable contract with one default implementation:
//! [`A2aMessageConverter`] turns inbound wire messages into internal
//! messages, and [`EventA2aConverter`] turns agent events into outbound wire
//! payloads.

mod inbound;
mod outbound;

pub use inbound::DefaultA2aMessageConverter;
pub use outbound::DefaultEventA2aConverter;

use trellis_a2a::{Message as A2aMessage, Task, TaskArtifactUpdateEvent};

use crate::error::AgentResult;
use crate::event::Event;
use crate::message::Message;

/// Options carried into an outbound conversion.
///
/// Streaming conversions require the task ID: artifact events cannot be
/// built without it.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Context ID of the exchange
    pub context_id: String,

    /// Task ID, present for streaming exchanges
    pub task_id: Option<String>,

    /// Whether the exchange is streaming
    pub streaming: bool,
}

/// Outbound wire payload produced from one event.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPayload {
    /// A whole reply message
    Message(A2aMessage),

    /// A task whose artifacts carry the reply
    Task(Task),

    /// A streamed artifact chunk
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

/// Converts inbound wire messages into internal agent messages.
pub trait A2aMessageConverter: Send + Sync {
    /// Convert a wire message into the internal form consumed by agents.
    fn convert_to_agent_message(&self, message: &A2aMessage) -> AgentResult<Message>;
}

/// Converts agent events into outbound wire payloads.
pub trait EventA2aConverter: Send + Sync {
    /// Convert one event.
    ///
    /// Returns `Ok(None)` for events that must not reach the wire (tool
    /// activity, empty content); returns an error when the event reports a
    /// backend failure.
    fn convert_to_a2a(
        &self,
        event: &Event,
        options: &ConvertOptions,
    ) -> AgentResult<Option<OutboundPayload>>;
}
