//! Task types for the A2A protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Artifact, Message};

/// A task represents one streaming exchange with an agent.
///
/// Tasks progress monotonically through their lifecycle states and accumulate
/// the artifacts produced during the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task
    pub id: String,

    /// Context ID grouping related tasks into one conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// Current status of the task
    pub status: TaskStatus,

    /// Artifacts produced by the task
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    /// Create a new task with the given ID, in the `Submitted` state
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_id: None,
            status: TaskStatus::new(TaskState::Submitted),
            artifacts: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Create a new task with a generated UUID
    pub fn new_with_uuid() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Set the context ID
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Add an artifact to the task
    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    /// Move the task forward to `state`.
    ///
    /// Backwards transitions and transitions out of a terminal state are
    /// rejected; the task is left unchanged.
    pub fn transition(&mut self, state: TaskState) -> Result<(), (TaskState, TaskState)> {
        if !self.status.state.can_transition_to(state) {
            return Err((self.status.state, state));
        }
        self.status = TaskStatus::new(state);
        Ok(())
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }
}

/// Status of a task: its state plus when it was entered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// Lifecycle state
    pub state: TaskState,

    /// When this state was entered
    pub timestamp: DateTime<Utc>,

    /// Optional message accompanying the status change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl TaskStatus {
    /// Create a status for `state`, stamped now
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            timestamp: Utc::now(),
            message: None,
        }
    }

    /// Attach a message to the status
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }
}

/// Lifecycle state of a task.
///
/// States are ordered; a task only ever moves forward through
/// `Submitted -> Working -> {Completed | Failed | Canceled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Task has been accepted but processing has not started
    Submitted,

    /// Task is actively being processed
    Working,

    /// Task completed successfully
    Completed,

    /// Task failed due to an error
    Failed,

    /// Task was canceled
    Canceled,
}

impl TaskState {
    /// Check if this state is terminal
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }

    /// Check whether moving to `next` is a legal forward transition
    pub fn can_transition_to(self, next: TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.rank() < next.rank() || (self == TaskState::Working && next.is_terminal())
    }

    fn rank(self) -> u8 {
        match self {
            TaskState::Submitted => 0,
            TaskState::Working => 1,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled => 2,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Submitted => write!(f, "submitted"),
            TaskState::Working => write!(f, "working"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Failed => write!(f, "failed"),
            TaskState::Canceled => write!(f, "canceled"),
        }
    }
}
