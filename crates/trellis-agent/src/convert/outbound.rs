//! Default outbound converter: agent events to wire payloads.

use trellis_a2a::{
    Artifact, Message as A2aMessage, Part, Role as A2aRole, TaskArtifactUpdateEvent,
};

use super::{ConvertOptions, EventA2aConverter, OutboundPayload};
use crate::error::{AgentError, AgentResult};
use crate::event::Event;

/// Default event-to-wire conversion.
///
/// Tool-call events never reach the wire in either mode. Response errors
/// surface as [`AgentError::Agent`]. Empty content produces nothing, so no
/// empty messages go out.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEventA2aConverter;

impl DefaultEventA2aConverter {
    fn artifact_id(task_id: &str) -> String {
        format!("artifact-{}", task_id)
    }
}

impl EventA2aConverter for DefaultEventA2aConverter {
    fn convert_to_a2a(
        &self,
        event: &Event,
        options: &ConvertOptions,
    ) -> AgentResult<Option<OutboundPayload>> {
        if event.is_tool_call() {
            return Ok(None);
        }

        let Some(response) = &event.response else {
            return Ok(None);
        };

        if let Some(error) = &response.error {
            return Err(AgentError::agent(error.message.clone()));
        }

        if options.streaming {
            let task_id = options.task_id.as_deref().ok_or_else(|| {
                AgentError::conversion(event.id.clone(), "streaming conversion requires a task ID")
            })?;

            let delta = response
                .choices
                .first()
                .map(|c| c.delta.content.as_str())
                .unwrap_or_default();
            if delta.is_empty() {
                return Ok(None);
            }

            Ok(Some(OutboundPayload::ArtifactUpdate(
                TaskArtifactUpdateEvent {
                    task_id: task_id.to_string(),
                    context_id: Some(options.context_id.clone()),
                    artifact: Artifact::new(Self::artifact_id(task_id)).with_part(Part::text(delta)),
                    append: true,
                    last_chunk: false,
                },
            )))
        } else {
            let content = response
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .unwrap_or_default();
            if content.is_empty() {
                return Ok(None);
            }

            let message = A2aMessage::new(A2aRole::Agent, vec![Part::text(content)])
                .with_context_id(options.context_id.clone());
            Ok(Some(OutboundPayload::Message(message)))
        }
    }
}
