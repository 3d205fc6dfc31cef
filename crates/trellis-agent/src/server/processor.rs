//! Per-request orchestration between the wire transport and the local agent.
//!
//! The processor authenticates, converts the inbound message, invokes the
//! runner, and fans the resulting events back out: collected into one reply
//! for unary requests, or pumped through the batching tunnel into the task's
//! subscriber for streaming requests. The streaming worker owns the task's
//! whole lifetime, including cleanup and panic recovery.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use trellis_a2a::server::{
    CallContext, MessageProcessingResult, MessageProcessor, ProcessOptions, TaskHandler,
    TaskSubscriber,
};
use trellis_a2a::{
    A2aError, A2aResult, Artifact, Message as A2aMessage, Part, Role as A2aRole, StreamingEvent,
    TaskArtifactUpdateEvent, TaskState, TaskStatusUpdateEvent,
};

use crate::agent::Runner;
use crate::convert::{
    A2aMessageConverter, ConvertOptions, DefaultA2aMessageConverter, DefaultEventA2aConverter,
    EventA2aConverter, OutboundPayload,
};
use crate::error::{AgentError, AgentResult};
use crate::event::Event;
use crate::tunnel::EventTunnel;

/// Canned reply of the default error handler.
pub const DEFAULT_ERROR_REPLY: &str = "An error occurred while processing your request.";

/// Shapes errors into wire messages sent back to the remote peer.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Produce the reply message for `error`.
    async fn handle(&self, original: &A2aMessage, error: &AgentError) -> AgentResult<A2aMessage>;
}

/// Default handler: a canned agent-role text reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

#[async_trait]
impl ErrorHandler for DefaultErrorHandler {
    async fn handle(&self, original: &A2aMessage, error: &AgentError) -> AgentResult<A2aMessage> {
        warn!(error = %error, "Shaping error into reply message");
        let mut reply = A2aMessage::agent(DEFAULT_ERROR_REPLY);
        reply.context_id = original.context_id.clone();
        Ok(reply)
    }
}

/// [`MessageProcessor`] backed by a local agent runner.
pub struct AgentMessageProcessor {
    runner: Arc<dyn Runner>,
    inbound: Arc<dyn A2aMessageConverter>,
    outbound: Arc<dyn EventA2aConverter>,
    error_handler: Arc<dyn ErrorHandler>,
    tunnel: EventTunnel,
    debug_logging: bool,
}

impl AgentMessageProcessor {
    /// Create a processor with default converters, error handler and tunnel.
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self {
            runner,
            inbound: Arc::new(DefaultA2aMessageConverter),
            outbound: Arc::new(DefaultEventA2aConverter),
            error_handler: Arc::new(DefaultErrorHandler),
            tunnel: EventTunnel::default(),
            debug_logging: false,
        }
    }

    /// Replace the inbound (wire-to-agent) converter.
    pub fn with_inbound_converter(mut self, converter: Arc<dyn A2aMessageConverter>) -> Self {
        self.inbound = converter;
        self
    }

    /// Replace the outbound (event-to-wire) converter.
    pub fn with_outbound_converter(mut self, converter: Arc<dyn EventA2aConverter>) -> Self {
        self.outbound = converter;
        self
    }

    /// Replace the error handler.
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    /// Replace the batching tunnel.
    pub fn with_tunnel(mut self, tunnel: EventTunnel) -> Self {
        self.tunnel = tunnel;
        self
    }

    /// Toggle per-event debug logging.
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    async fn error_result(
        &self,
        original: &A2aMessage,
        error: AgentError,
        streaming: bool,
    ) -> A2aResult<MessageProcessingResult> {
        match self.error_handler.handle(original, &error).await {
            Ok(reply) if streaming => Ok(MessageProcessingResult::single_message(reply)),
            Ok(reply) => Ok(MessageProcessingResult::unary(reply)),
            Err(handler_error) => Err(to_wire_error(handler_error)),
        }
    }

    async fn process_unary(
        &self,
        ctx: &CallContext,
        original: A2aMessage,
        user_id: &str,
        context_id: String,
        internal: crate::message::Message,
        runtime_state: std::collections::HashMap<String, serde_json::Value>,
    ) -> A2aResult<MessageProcessingResult> {
        let mut events = match self
            .runner
            .run(user_id, &context_id, internal, runtime_state)
            .await
        {
            Ok(events) => events,
            Err(e) => return self.error_result(&original, e, false).await,
        };

        let options = ConvertOptions {
            context_id: context_id.clone(),
            task_id: None,
            streaming: false,
        };
        let mut parts: Vec<Part> = Vec::new();

        loop {
            tokio::select! {
                _ = ctx.cancellation().cancelled() => return Err(A2aError::Canceled),
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else { break };
                    if self.debug_logging {
                        debug!(event_id = %event.id, author = %event.author, "Processing event");
                    }
                    if event.response.is_none() {
                        continue;
                    }
                    match self.outbound.convert_to_a2a(&event, &options) {
                        Ok(Some(OutboundPayload::Message(message))) => parts.extend(message.parts),
                        Ok(Some(OutboundPayload::Task(task))) => {
                            for artifact in task.artifacts {
                                parts.extend(artifact.parts);
                            }
                        }
                        Ok(Some(OutboundPayload::ArtifactUpdate(update))) => {
                            parts.extend(update.artifact.parts);
                        }
                        Ok(None) => {}
                        // Backend-reported errors go through the error
                        // handler; conversion failures abort the exchange.
                        Err(e @ AgentError::Agent(_)) => {
                            return self.error_result(&original, e, false).await;
                        }
                        Err(e) => return Err(to_wire_error(e)),
                    }
                }
            }
        }

        if parts.is_empty() {
            return self
                .error_result(
                    &original,
                    AgentError::agent("no response parts from agent"),
                    false,
                )
                .await;
        }

        let reply = A2aMessage::new(A2aRole::Agent, parts).with_context_id(context_id);
        Ok(MessageProcessingResult::unary(reply))
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_streaming(
        &self,
        ctx: &CallContext,
        original: A2aMessage,
        user_id: &str,
        context_id: String,
        internal: crate::message::Message,
        runtime_state: std::collections::HashMap<String, serde_json::Value>,
        handler: Arc<dyn TaskHandler>,
    ) -> A2aResult<MessageProcessingResult> {
        let task_id = handler.build_task(None, Some(&context_id)).await?;
        let (subscriber, stream) = handler.subscribe_task(&task_id).await?;

        let events = match self
            .runner
            .run(user_id, &context_id, internal, runtime_state)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                handler.cleanup_task(&task_id).await;
                return self.error_result(&original, e, true).await;
            }
        };

        let pump = StreamingPump {
            handler,
            subscriber: Arc::new(subscriber),
            outbound: Arc::clone(&self.outbound),
            error_handler: Arc::clone(&self.error_handler),
            tunnel: self.tunnel,
            cancel: ctx.cancellation().clone(),
            task_id,
            context_id,
            original,
            debug_logging: self.debug_logging,
        };
        tokio::spawn(pump.run(events));

        Ok(MessageProcessingResult::streaming(stream))
    }
}

#[async_trait]
impl MessageProcessor for AgentMessageProcessor {
    async fn process_message(
        &self,
        ctx: CallContext,
        message: A2aMessage,
        options: ProcessOptions,
        handler: Arc<dyn TaskHandler>,
    ) -> A2aResult<MessageProcessingResult> {
        let Some(user_id) = ctx.user_id().map(str::to_string) else {
            return self
                .error_result(
                    &message,
                    AgentError::auth("no user on request context"),
                    options.streaming,
                )
                .await;
        };

        let Some(context_id) = message.context_id.clone() else {
            return Err(A2aError::invalid_message("message is missing contextId"));
        };

        let internal = self
            .inbound
            .convert_to_agent_message(&message)
            .map_err(|e| A2aError::invalid_message(e.to_string()))?;
        let runtime_state = message.metadata.clone();

        if options.streaming {
            self.process_streaming(
                &ctx,
                message,
                &user_id,
                context_id,
                internal,
                runtime_state,
                handler,
            )
            .await
        } else {
            self.process_unary(&ctx, message, &user_id, context_id, internal, runtime_state)
                .await
        }
    }
}

fn to_wire_error(error: AgentError) -> A2aError {
    match error {
        AgentError::A2a(e) => e,
        AgentError::Canceled => A2aError::Canceled,
        other => A2aError::internal_error(other.to_string()),
    }
}

/// Worker owning one streaming task's lifetime.
struct StreamingPump {
    handler: Arc<dyn TaskHandler>,
    subscriber: Arc<TaskSubscriber>,
    outbound: Arc<dyn EventA2aConverter>,
    error_handler: Arc<dyn ErrorHandler>,
    tunnel: EventTunnel,
    cancel: CancellationToken,
    task_id: String,
    context_id: String,
    original: A2aMessage,
    debug_logging: bool,
}

impl StreamingPump {
    async fn run(self, events: mpsc::Receiver<Event>) {
        let outcome = AssertUnwindSafe(self.drive(events)).catch_unwind().await;

        match outcome {
            Ok(Ok(())) => self.finalize().await,
            Ok(Err(e)) if e.is_canceled() => {
                // No terminal event after cancel; the subscriber just closes.
                debug!(task_id = %self.task_id, "Streaming exchange canceled");
            }
            Ok(Err(e)) => self.fail(e).await,
            Err(panic) => {
                let reason = panic_message(panic);
                error!(task_id = %self.task_id, panic = %reason, "Streaming worker panicked");
                self.fail(AgentError::agent(format!(
                    "panic in streaming worker: {}",
                    reason
                )))
                .await;
            }
        }

        self.handler.cleanup_task(&self.task_id).await;
        // Dropping self drops the subscriber, which ends the stream.
    }

    async fn drive(&self, events: mpsc::Receiver<Event>) -> AgentResult<()> {
        // Submitted goes out before any agent work is forwarded.
        let task = self.handler.get_task(&self.task_id).await?;
        self.subscriber
            .send(StreamingEvent::StatusUpdate(TaskStatusUpdateEvent {
                task_id: self.task_id.clone(),
                context_id: task.context_id.clone(),
                status: task.status.clone(),
                is_final: false,
            }))
            .await?;

        let options = ConvertOptions {
            context_id: self.context_id.clone(),
            task_id: Some(self.task_id.clone()),
            streaming: true,
        };
        let sent_working = Arc::new(AtomicBool::new(false));
        let sent_chunk = Arc::new(AtomicBool::new(false));

        let handler = Arc::clone(&self.handler);
        let subscriber = Arc::clone(&self.subscriber);
        let outbound = Arc::clone(&self.outbound);
        let task_id = self.task_id.clone();
        let debug_logging = self.debug_logging;

        self.tunnel
            .run(events, self.cancel.clone(), move |batch: Vec<Event>| {
                let handler = Arc::clone(&handler);
                let subscriber = Arc::clone(&subscriber);
                let outbound = Arc::clone(&outbound);
                let sent_working = Arc::clone(&sent_working);
                let sent_chunk = Arc::clone(&sent_chunk);
                let options = options.clone();
                let task_id = task_id.clone();

                async move {
                    for event in &batch {
                        if debug_logging {
                            debug!(event_id = %event.id, "Processing streaming event");
                        }
                        match outbound.convert_to_a2a(event, &options)? {
                            Some(OutboundPayload::ArtifactUpdate(mut update)) => {
                                if !sent_working.swap(true, Ordering::SeqCst) {
                                    let status = handler
                                        .update_status(&task_id, TaskState::Working, None)
                                        .await?;
                                    subscriber
                                        .send(StreamingEvent::StatusUpdate(status))
                                        .await?;
                                }
                                update.append = sent_chunk.swap(true, Ordering::SeqCst);
                                handler.add_artifact(&task_id, update.artifact.clone()).await?;
                                subscriber
                                    .send(StreamingEvent::ArtifactUpdate(update))
                                    .await?;
                            }
                            Some(OutboundPayload::Message(message)) => {
                                subscriber.send(StreamingEvent::Message(message)).await?;
                            }
                            Some(OutboundPayload::Task(_)) => {
                                debug!(task_id = %task_id, "Ignoring task payload in streaming conversion");
                            }
                            None => {}
                        }
                        if event.is_final_streaming() {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
            })
            .await
    }

    async fn finalize(&self) {
        // Close the artifact: an empty chunk carrying the lastChunk flag,
        // then the terminal status.
        let final_chunk = TaskArtifactUpdateEvent {
            task_id: self.task_id.clone(),
            context_id: Some(self.context_id.clone()),
            artifact: Artifact::new(format!("artifact-{}", self.task_id)),
            append: true,
            last_chunk: true,
        };
        if let Err(e) = self
            .subscriber
            .send(StreamingEvent::ArtifactUpdate(final_chunk))
            .await
        {
            debug!(task_id = %self.task_id, error = %e, "Subscriber gone before final chunk");
            return;
        }

        match self
            .handler
            .update_status(&self.task_id, TaskState::Completed, None)
            .await
        {
            Ok(status) => {
                let _ = self
                    .subscriber
                    .send(StreamingEvent::StatusUpdate(status))
                    .await;
            }
            Err(e) => warn!(task_id = %self.task_id, error = %e, "Failed to complete task"),
        }
    }

    async fn fail(&self, error: AgentError) {
        warn!(task_id = %self.task_id, error = %error, "Streaming exchange failed");

        // Flush the shaped error through the subscriber before the terminal
        // status.
        match self.error_handler.handle(&self.original, &error).await {
            Ok(reply) => {
                let _ = self.subscriber.send(StreamingEvent::Message(reply)).await;
            }
            Err(handler_error) => {
                warn!(error = %handler_error, "Error handler failed");
            }
        }

        match self
            .handler
            .update_status(&self.task_id, TaskState::Failed, None)
            .await
        {
            Ok(status) => {
                let _ = self
                    .subscriber
                    .send(StreamingEvent::StatusUpdate(status))
                    .await;
            }
            Err(e) => debug!(task_id = %self.task_id, error = %e, "Could not mark task failed"),
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
