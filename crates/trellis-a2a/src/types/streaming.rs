//! Streaming event types for the A2A protocol.

use serde::{Deserialize, Serialize};

use super::{Artifact, Message, TaskStatus};

/// Event carrying a task status change during streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    /// Task ID
    pub task_id: String,

    /// Context ID of the task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// New status
    pub status: TaskStatus,

    /// Whether this is the last event of the stream
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

/// Event carrying an artifact chunk during streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    /// Task ID
    pub task_id: String,

    /// Context ID of the task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// The artifact chunk
    pub artifact: Artifact,

    /// Whether this chunk appends to a previously sent artifact
    #[serde(default)]
    pub append: bool,

    /// Whether this is the last chunk of the artifact
    #[serde(default)]
    pub last_chunk: bool,
}

/// Unified streaming event, discriminated by `kind` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StreamingEvent {
    /// A complete message
    #[serde(rename = "message")]
    Message(Message),

    /// Task status update
    #[serde(rename = "status-update")]
    StatusUpdate(TaskStatusUpdateEvent),

    /// Artifact chunk
    #[serde(rename = "artifact-update")]
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

impl StreamingEvent {
    /// Check whether the stream ends after this event
    pub fn is_final(&self) -> bool {
        match self {
            StreamingEvent::StatusUpdate(update) => update.is_final,
            _ => false,
        }
    }
}
