//! Client-side conversion: invocations to wire messages, wire replies to
//! events.

use trellis_a2a::{
    Message as A2aMessage, Part, Role as A2aRole, SendMessageResult, StreamingEvent, TaskState,
};

use crate::error::AgentResult;
use crate::event::{Choice, Event, Response};
use crate::invocation::Invocation;
use crate::message::{ContentPart, FileSource, Message};

/// Converts an outgoing invocation into a wire message.
pub trait InvocationA2aConverter: Send + Sync {
    /// Build the wire message for an invocation.
    fn convert_to_a2a_message(&self, invocation: &Invocation) -> AgentResult<A2aMessage>;
}

/// Converts wire replies back into internal events.
pub trait A2aEventConverter: Send + Sync {
    /// Convert a unary reply.
    fn convert_result(
        &self,
        result: &SendMessageResult,
        invocation: &Invocation,
    ) -> AgentResult<Event>;

    /// Convert one streaming event; `Ok(None)` drops it.
    fn convert_stream_event(
        &self,
        event: &StreamingEvent,
        invocation: &Invocation,
    ) -> AgentResult<Option<Event>>;
}

/// Default invocation-to-wire conversion.
///
/// Text-only messages collapse into a single text part; mixed content emits
/// one wire part per content part. Only the configured transfer-state keys
/// are copied into the wire metadata, and only when present.
#[derive(Debug, Clone, Default)]
pub struct DefaultInvocationA2aConverter {
    transfer_state_keys: Vec<String>,
}

impl DefaultInvocationA2aConverter {
    /// Create a converter copying the given runtime-state keys.
    pub fn new(transfer_state_keys: Vec<String>) -> Self {
        Self {
            transfer_state_keys,
        }
    }
}

impl InvocationA2aConverter for DefaultInvocationA2aConverter {
    fn convert_to_a2a_message(&self, invocation: &Invocation) -> AgentResult<A2aMessage> {
        let message = &invocation.message;
        let all_text = message.content_parts.iter().all(|p| p.as_text().is_some());

        let parts = if all_text {
            // Text-only (or empty) input collapses into one text part; an
            // empty message still produces a valid single-part message.
            vec![Part::text(message.content.clone())]
        } else {
            message.content_parts.iter().map(content_part_to_wire).collect()
        };

        let mut wire =
            A2aMessage::new(A2aRole::User, parts).with_context_id(invocation.session.id.clone());

        for key in &self.transfer_state_keys {
            if let Some(value) = invocation.runtime_state.get(key) {
                wire.metadata.insert(key.clone(), value.clone());
            }
        }

        Ok(wire)
    }
}

fn content_part_to_wire(part: &ContentPart) -> Part {
    match part {
        ContentPart::Text { text } => Part::text(text.clone()),
        ContentPart::File {
            name,
            mime_type,
            source,
        }
        | ContentPart::Image {
            name,
            mime_type,
            source,
        }
        | ContentPart::Audio {
            name,
            mime_type,
            source,
        } => match source {
            FileSource::Bytes(bytes) => {
                Part::file_bytes(name.clone(), mime_type.clone(), bytes)
            }
            FileSource::FileId(id) => Part::file_uri(name.clone(), mime_type.clone(), id.clone()),
        },
        ContentPart::Data { value } => Part::data(value.clone()),
    }
}

/// Default wire-to-event conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultA2aEventConverter;

impl DefaultA2aEventConverter {
    fn whole_message_event(invocation: &Invocation, content: String, done: bool) -> Event {
        Event::new(
            invocation.invocation_id.clone(),
            String::new(),
            Response {
                object: "chat.completion".to_string(),
                choices: vec![Choice {
                    message: Message::assistant(content),
                    ..Default::default()
                }],
                done,
                is_partial: false,
                ..Default::default()
            },
        )
    }
}

impl A2aEventConverter for DefaultA2aEventConverter {
    fn convert_result(
        &self,
        result: &SendMessageResult,
        invocation: &Invocation,
    ) -> AgentResult<Event> {
        let content = match result {
            SendMessageResult::Message(message) => message.text_content(),
            SendMessageResult::Task(task) => task
                .artifacts
                .iter()
                .map(|a| a.text_content())
                .collect::<Vec<_>>()
                .concat(),
        };
        Ok(Self::whole_message_event(invocation, content, true))
    }

    fn convert_stream_event(
        &self,
        event: &StreamingEvent,
        invocation: &Invocation,
    ) -> AgentResult<Option<Event>> {
        match event {
            StreamingEvent::ArtifactUpdate(update) => {
                let text = update.artifact.text_content();
                if text.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Event::new(
                    invocation.invocation_id.clone(),
                    String::new(),
                    Response {
                        object: "chat.completion.chunk".to_string(),
                        choices: vec![Choice {
                            delta: Message::assistant(text),
                            ..Default::default()
                        }],
                        done: false,
                        is_partial: true,
                        ..Default::default()
                    },
                )))
            }
            StreamingEvent::StatusUpdate(update) => match update.status.state {
                TaskState::Failed => {
                    let reason = update
                        .status
                        .message
                        .as_ref()
                        .map(|m| m.text_content())
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| format!("task {} failed", update.task_id));
                    Ok(Some(Event::error(
                        invocation.invocation_id.clone(),
                        String::new(),
                        reason,
                    )))
                }
                // Lifecycle chatter is not re-emitted; the client synthesizes
                // its own final event at stream end.
                _ => Ok(None),
            },
            StreamingEvent::Message(message) => Ok(Some(Self::whole_message_event(
                invocation,
                message.text_content(),
                false,
            ))),
        }
    }
}
