//! A2A protocol core types.
//!
//! Wire-level data types for the Agent2Agent (A2A) protocol: messages and
//! their content parts, tasks and artifacts, agent cards for capability
//! discovery, streaming events, and the JSON-RPC envelope.
//!
//! ## Module structure
//!
//! - [`message`] - Message and role types
//! - [`part`] - Content part types (text, file, data)
//! - [`task`] - Task lifecycle and status types
//! - [`artifact`] - Task output artifacts
//! - [`agent_card`] - Agent capability discovery
//! - [`streaming`] - Streaming event types
//! - [`request`] - JSON-RPC request/response types

mod agent_card;
mod artifact;
mod message;
mod part;
mod request;
mod streaming;
mod task;

pub use agent_card::{
    AGENT_CARD_WELL_KNOWN_PATH, AgentCapabilities, AgentCard, AgentSkill,
};
pub use artifact::Artifact;
pub use message::{Message, Role};
pub use part::{DataPart, FileContent, FilePart, FileWithBytes, FileWithUri, Part, TextPart};
pub use request::{
    JsonRpcRequest, JsonRpcResponse, METHOD_MESSAGE_SEND, METHOD_MESSAGE_STREAM,
    METHOD_TASKS_CANCEL, METHOD_TASKS_GET, MessageSendParams, SendMessageResult, TaskIdParams,
};
pub use streaming::{StreamingEvent, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};
pub use task::{Task, TaskState, TaskStatus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let msg = Message::user("Hello").with_context_id("ctx-1");
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["role"], "user");
        assert_eq!(value["contextId"], "ctx-1");
        assert_eq!(value["parts"][0]["kind"], "text");
        assert_eq!(value["parts"][0]["text"], "Hello");
    }

    #[test]
    fn test_streaming_event_wire_shape() {
        let event = StreamingEvent::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: "t-1".to_string(),
            context_id: Some("ctx-1".to_string()),
            artifact: Artifact::text("a-1", "chunk"),
            append: false,
            last_chunk: true,
        });
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["kind"], "artifact-update");
        assert_eq!(value["taskId"], "t-1");
        assert_eq!(value["lastChunk"], true);
    }

    #[test]
    fn test_text_part_bytes_preserved() {
        let original = "unicode \u{1F980} and \"quotes\"\nnewlines";
        let part = Part::text(original);
        let json = serde_json::to_string(&part).unwrap();
        let parsed: Part = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_text(), Some(original));
    }
}
