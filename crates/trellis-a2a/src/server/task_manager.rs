//! In-memory task lifecycle management and streaming subscribers.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{A2aError, A2aResult};
use crate::types::{
    Artifact, Message, StreamingEvent, Task, TaskState, TaskStatus, TaskStatusUpdateEvent,
};

/// Default capacity of a task's streaming channel
const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Sink half of a task's streaming channel.
///
/// Owned by the worker driving the task; dropping it closes the stream seen
/// by the HTTP response.
#[derive(Debug)]
pub struct TaskSubscriber {
    task_id: String,
    tx: mpsc::Sender<StreamingEvent>,
}

impl TaskSubscriber {
    /// Push an event toward the remote peer
    pub async fn send(&self, event: StreamingEvent) -> A2aResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| A2aError::SubscriberClosed {
                task_id: self.task_id.clone(),
            })
    }

    /// ID of the task this subscriber belongs to
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

/// Receiving half of a task's streaming channel, consumed by the transport.
#[derive(Debug)]
pub struct TaskEventStream {
    rx: mpsc::Receiver<StreamingEvent>,
}

impl TaskEventStream {
    /// Wrap a receiver
    pub fn new(rx: mpsc::Receiver<StreamingEvent>) -> Self {
        Self { rx }
    }

    /// Build a pre-closed stream yielding exactly one message event.
    ///
    /// Used to shape errors in streaming mode: the stream delivers the
    /// message and then ends; there is no sender left to push more.
    pub fn single_message(message: Message) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 on a fresh channel: the send cannot fail.
        let _ = tx.try_send(StreamingEvent::Message(message));
        Self { rx }
    }

    /// Receive the next event; `None` when the stream has ended
    pub async fn recv(&mut self) -> Option<StreamingEvent> {
        self.rx.recv().await
    }

    /// Unwrap the underlying receiver
    pub fn into_inner(self) -> mpsc::Receiver<StreamingEvent> {
        self.rx
    }
}

/// Task lifecycle hooks exposed to message processors.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Create a task (or adopt `task_id` if given); returns the task ID
    async fn build_task(
        &self,
        task_id: Option<String>,
        context_id: Option<&str>,
    ) -> A2aResult<String>;

    /// Open the streaming channel for a task
    async fn subscribe_task(&self, task_id: &str)
    -> A2aResult<(TaskSubscriber, TaskEventStream)>;

    /// Fetch a task by ID
    async fn get_task(&self, task_id: &str) -> A2aResult<Task>;

    /// Move a task forward and return the corresponding status event
    async fn update_status(
        &self,
        task_id: &str,
        state: TaskState,
        message: Option<Message>,
    ) -> A2aResult<TaskStatusUpdateEvent>;

    /// Record an artifact chunk on the task
    async fn add_artifact(&self, task_id: &str, artifact: Artifact) -> A2aResult<()>;

    /// Cancel a task and notify its subscriber
    async fn cancel_task(&self, task_id: &str) -> A2aResult<Task>;

    /// Drop all per-task state; called when the owning worker exits
    async fn cleanup_task(&self, task_id: &str);
}

/// In-memory [`TaskHandler`].
///
/// Tasks live only for the duration of their exchange; there is no
/// persistence.
#[derive(Debug)]
pub struct TaskManager {
    tasks: RwLock<HashMap<String, Task>>,
    subscribers: RwLock<HashMap<String, mpsc::Sender<StreamingEvent>>>,
    buffer: usize,
}

impl TaskManager {
    /// Create a manager with the default subscriber buffer
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }

    /// Create a manager with a custom subscriber buffer
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Number of live tasks
    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskHandler for TaskManager {
    async fn build_task(
        &self,
        task_id: Option<String>,
        context_id: Option<&str>,
    ) -> A2aResult<String> {
        let id = task_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut task = Task::new(id.clone());
        task.context_id = context_id.map(str::to_string);

        self.tasks.write().await.insert(id.clone(), task);
        debug!(task_id = %id, "Task created");
        Ok(id)
    }

    async fn subscribe_task(
        &self,
        task_id: &str,
    ) -> A2aResult<(TaskSubscriber, TaskEventStream)> {
        if !self.tasks.read().await.contains_key(task_id) {
            return Err(A2aError::task_not_found(task_id));
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers
            .write()
            .await
            .insert(task_id.to_string(), tx.clone());

        Ok((
            TaskSubscriber {
                task_id: task_id.to_string(),
                tx,
            },
            TaskEventStream::new(rx),
        ))
    }

    async fn get_task(&self, task_id: &str) -> A2aResult<Task> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| A2aError::task_not_found(task_id))
    }

    async fn update_status(
        &self,
        task_id: &str,
        state: TaskState,
        message: Option<Message>,
    ) -> A2aResult<TaskStatusUpdateEvent> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| A2aError::task_not_found(task_id))?;

        task.transition(state)
            .map_err(|(from, to)| A2aError::InvalidStateTransition {
                task_id: task_id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            })?;
        task.status.message = message;

        Ok(TaskStatusUpdateEvent {
            task_id: task_id.to_string(),
            context_id: task.context_id.clone(),
            status: task.status.clone(),
            is_final: state.is_terminal(),
        })
    }

    async fn add_artifact(&self, task_id: &str, artifact: Artifact) -> A2aResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| A2aError::task_not_found(task_id))?;
        task.add_artifact(artifact);
        Ok(())
    }

    async fn cancel_task(&self, task_id: &str) -> A2aResult<Task> {
        let event = {
            let mut tasks = self.tasks.write().await;
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| A2aError::task_not_found(task_id))?;

            if task.is_terminal() {
                return Err(A2aError::task_terminated(
                    task_id,
                    task.status.state.to_string(),
                ));
            }

            task.status = TaskStatus::new(TaskState::Canceled);
            TaskStatusUpdateEvent {
                task_id: task_id.to_string(),
                context_id: task.context_id.clone(),
                status: task.status.clone(),
                is_final: true,
            }
        };

        // Best-effort notification; the worker may already be gone.
        if let Some(tx) = self.subscribers.write().await.remove(task_id) {
            if tx
                .send(StreamingEvent::StatusUpdate(event))
                .await
                .is_err()
            {
                warn!(task_id = %task_id, "Subscriber gone before cancel notification");
            }
        }

        self.get_task(task_id).await
    }

    async fn cleanup_task(&self, task_id: &str) {
        self.tasks.write().await.remove(task_id);
        self.subscribers.write().await.remove(task_id);
        debug!(task_id = %task_id, "Task cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Part;

    #[tokio::test]
    async fn test_build_and_get_task() {
        let manager = TaskManager::new();
        let id = manager.build_task(None, Some("ctx-1")).await.unwrap();

        let task = manager.get_task(&id).await.unwrap();
        assert_eq!(task.context_id.as_deref(), Some("ctx-1"));
        assert_eq!(task.status.state, TaskState::Submitted);
    }

    #[tokio::test]
    async fn test_subscriber_roundtrip() {
        let manager = TaskManager::new();
        let id = manager.build_task(None, None).await.unwrap();
        let (subscriber, mut stream) = manager.subscribe_task(&id).await.unwrap();

        subscriber
            .send(StreamingEvent::Message(Message::agent("hi")))
            .await
            .unwrap();
        drop(subscriber);

        assert!(matches!(
            stream.recv().await,
            Some(StreamingEvent::Message(_))
        ));
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_unknown_task_fails() {
        let manager = TaskManager::new();
        assert!(matches!(
            manager.subscribe_task("missing").await,
            Err(A2aError::TaskNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_status_enforces_forward_only() {
        let manager = TaskManager::new();
        let id = manager.build_task(None, None).await.unwrap();

        let event = manager
            .update_status(&id, TaskState::Working, None)
            .await
            .unwrap();
        assert!(!event.is_final);

        let event = manager
            .update_status(&id, TaskState::Completed, None)
            .await
            .unwrap();
        assert!(event.is_final);

        assert!(matches!(
            manager.update_status(&id, TaskState::Working, None).await,
            Err(A2aError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_notifies_subscriber() {
        let manager = TaskManager::new();
        let id = manager.build_task(None, None).await.unwrap();
        let (_subscriber, mut stream) = manager.subscribe_task(&id).await.unwrap();

        let task = manager.cancel_task(&id).await.unwrap();
        assert_eq!(task.status.state, TaskState::Canceled);

        match stream.recv().await {
            Some(StreamingEvent::StatusUpdate(update)) => {
                assert_eq!(update.status.state, TaskState::Canceled);
                assert!(update.is_final);
            }
            other => panic!("expected cancel status update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_terminal_task_rejected() {
        let manager = TaskManager::new();
        let id = manager.build_task(None, None).await.unwrap();
        manager
            .update_status(&id, TaskState::Completed, None)
            .await
            .unwrap();

        assert!(matches!(
            manager.cancel_task(&id).await,
            Err(A2aError::TaskTerminated { .. })
        ));
    }

    #[tokio::test]
    async fn test_single_message_stream() {
        let mut stream = TaskEventStream::single_message(
            Message::agent("only").with_part(Part::text("!")),
        );

        assert!(matches!(
            stream.recv().await,
            Some(StreamingEvent::Message(_))
        ));
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_state() {
        let manager = TaskManager::new();
        let id = manager.build_task(None, None).await.unwrap();
        assert_eq!(manager.task_count().await, 1);

        manager.cleanup_task(&id).await;
        assert_eq!(manager.task_count().await, 0);
        assert!(manager.get_task(&id).await.is_err());
    }
}
