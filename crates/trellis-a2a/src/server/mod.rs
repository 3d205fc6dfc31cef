//! A2A protocol server transport.
//!
//! Serves an agent card at a well-known path and a JSON-RPC endpoint
//! implementing `message/send`, `message/stream` (SSE), `tasks/get` and
//! `tasks/cancel`. The agent semantics behind the endpoint are supplied
//! through the [`MessageProcessor`] hook; task lifecycle and streaming
//! plumbing through [`TaskHandler`]; identity through [`AuthProvider`].

mod context;
mod task_manager;

pub use context::{
    AnonymousAuthProvider, AuthProvider, CallContext, HeaderMap, HeaderName, HeaderValue, User,
};
pub use task_manager::{TaskEventStream, TaskHandler, TaskManager, TaskSubscriber};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::error::{A2aError, A2aResult, ErrorResponse};
use crate::types::{
    AGENT_CARD_WELL_KNOWN_PATH, AgentCard, JsonRpcRequest, JsonRpcResponse, METHOD_MESSAGE_SEND,
    METHOD_MESSAGE_STREAM, METHOD_TASKS_CANCEL, METHOD_TASKS_GET, Message, MessageSendParams,
    SendMessageResult, TaskIdParams,
};

/// Options for one `process_message` call
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Whether the caller requested a streaming reply
    pub streaming: bool,
}

/// Outcome of processing one message: a direct reply, a stream, or both
/// halves empty (treated as an internal error by the transport).
pub struct MessageProcessingResult {
    /// Unary reply message
    pub message: Option<Message>,

    /// Streaming reply events
    pub streaming_events: Option<TaskEventStream>,
}

impl MessageProcessingResult {
    /// A unary reply
    pub fn unary(message: Message) -> Self {
        Self {
            message: Some(message),
            streaming_events: None,
        }
    }

    /// A streaming reply
    pub fn streaming(events: TaskEventStream) -> Self {
        Self {
            message: None,
            streaming_events: Some(events),
        }
    }

    /// A streaming reply that delivers exactly one message and ends
    pub fn single_message(message: Message) -> Self {
        Self::streaming(TaskEventStream::single_message(message))
    }
}

/// Hook implementing the agent semantics behind the JSON-RPC endpoint.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Process one inbound message.
    ///
    /// For streaming requests the implementation is expected to return
    /// promptly with a [`TaskEventStream`] and drive the exchange from a
    /// detached worker.
    async fn process_message(
        &self,
        ctx: CallContext,
        message: Message,
        options: ProcessOptions,
        handler: Arc<dyn TaskHandler>,
    ) -> A2aResult<MessageProcessingResult>;
}

/// Transport-level configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path the agent card is served at
    pub card_path: String,

    /// Whether to attach a permissive CORS layer
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            card_path: AGENT_CARD_WELL_KNOWN_PATH.to_string(),
            cors: true,
        }
    }
}

/// A2A protocol server.
///
/// Wires an agent card, a message processor, an auth provider and a task
/// manager into an axum router.
pub struct A2aServer {
    card: Arc<AgentCard>,
    processor: Arc<dyn MessageProcessor>,
    auth: Arc<dyn AuthProvider>,
    tasks: Arc<TaskManager>,
    config: ServerConfig,
}

#[derive(Clone)]
struct AppState {
    card: Arc<AgentCard>,
    processor: Arc<dyn MessageProcessor>,
    auth: Arc<dyn AuthProvider>,
    tasks: Arc<TaskManager>,
}

impl A2aServer {
    /// Create a server with the default task manager and anonymous auth
    pub fn new(card: AgentCard, processor: Arc<dyn MessageProcessor>) -> Self {
        Self {
            card: Arc::new(card),
            processor,
            auth: Arc::new(AnonymousAuthProvider),
            tasks: Arc::new(TaskManager::new()),
            config: ServerConfig::default(),
        }
    }

    /// Replace the auth provider
    pub fn with_auth_provider(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    /// Replace the task manager
    pub fn with_task_manager(mut self, tasks: Arc<TaskManager>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Replace the transport configuration
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the axum router for this server
    pub fn router(&self) -> Router {
        let state = AppState {
            card: Arc::clone(&self.card),
            processor: Arc::clone(&self.processor),
            auth: Arc::clone(&self.auth),
            tasks: Arc::clone(&self.tasks),
        };

        let mut router = Router::new()
            .route(&self.config.card_path, get(get_agent_card))
            .route("/", post(rpc_handler))
            .with_state(state);

        if self.config.cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Serve on an already-bound listener until it fails or `shutdown`
    /// resolves
    pub async fn serve_with_shutdown(
        self,
        listener: tokio::net::TcpListener,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> A2aResult<()> {
        info!(
            agent = %self.card.name,
            card_path = %self.config.card_path,
            "A2A server starting"
        );

        let router = self.router();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| A2aError::internal_error(format!("Server error: {}", e)))
    }

    /// Serve on the given address until the listener fails
    pub async fn serve(self, addr: &str) -> A2aResult<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| A2aError::internal_error(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }
}

// =============================================================================
// Route handlers
// =============================================================================

/// GET <card_path> - agent card discovery; served without authentication
async fn get_agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    debug!(agent = %state.card.name, "Serving agent card");
    Json(state.card.as_ref().clone())
}

/// POST / - JSON-RPC dispatch
async fn rpc_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let user = match state.auth.authenticate(&headers).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, method = %request.method, "Authentication failed");
            return (
                StatusCode::UNAUTHORIZED,
                Json(JsonRpcResponse::error(request.id, e.into())),
            )
                .into_response();
        }
    };

    let ctx = CallContext::with_user(user);

    let method = request.method.clone();
    match method.as_str() {
        METHOD_MESSAGE_SEND => handle_message_send(state, ctx, request).await,
        METHOD_MESSAGE_STREAM => handle_message_stream(state, ctx, request).await,
        METHOD_TASKS_GET => handle_tasks_get(state, request).await,
        METHOD_TASKS_CANCEL => handle_tasks_cancel(state, request).await,
        other => {
            debug!(method = %other, "Unknown JSON-RPC method");
            rpc_error(
                request.id,
                A2aError::MethodNotFound {
                    method: other.to_string(),
                },
            )
        }
    }
}

async fn handle_message_send(state: AppState, ctx: CallContext, request: JsonRpcRequest) -> Response {
    let params: MessageSendParams = match serde_json::from_value(request.params) {
        Ok(params) => params,
        Err(e) => return rpc_error(request.id, A2aError::invalid_params(e.to_string())),
    };

    let handler: Arc<dyn TaskHandler> = Arc::clone(&state.tasks) as Arc<dyn TaskHandler>;
    let result = state
        .processor
        .process_message(ctx, params.message, ProcessOptions { streaming: false }, handler)
        .await;

    match result {
        Ok(MessageProcessingResult {
            message: Some(message),
            ..
        }) => rpc_success(request.id, SendMessageResult::Message(message)),
        Ok(_) => rpc_error(
            request.id,
            A2aError::internal_error("processor returned no message for unary request"),
        ),
        Err(e) => rpc_error(request.id, e),
    }
}

async fn handle_message_stream(
    state: AppState,
    ctx: CallContext,
    request: JsonRpcRequest,
) -> Response {
    let params: MessageSendParams = match serde_json::from_value(request.params) {
        Ok(params) => params,
        Err(e) => return rpc_error(request.id, A2aError::invalid_params(e.to_string())),
    };

    let handler: Arc<dyn TaskHandler> = Arc::clone(&state.tasks) as Arc<dyn TaskHandler>;
    let result = state
        .processor
        .process_message(ctx, params.message, ProcessOptions { streaming: true }, handler)
        .await;

    let events = match result {
        Ok(MessageProcessingResult {
            streaming_events: Some(events),
            ..
        }) => events,
        Ok(MessageProcessingResult {
            message: Some(message),
            ..
        }) => TaskEventStream::single_message(message),
        Ok(_) => {
            return rpc_error(
                request.id,
                A2aError::internal_error("processor returned no stream for streaming request"),
            );
        }
        Err(e) => return rpc_error(request.id, e),
    };

    let stream = sse_event_stream(events, request.id);
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn handle_tasks_get(state: AppState, request: JsonRpcRequest) -> Response {
    let params: TaskIdParams = match serde_json::from_value(request.params) {
        Ok(params) => params,
        Err(e) => return rpc_error(request.id, A2aError::invalid_params(e.to_string())),
    };

    match state.tasks.get_task(&params.id).await {
        Ok(task) => rpc_success(request.id, task),
        Err(e) => rpc_error(request.id, e),
    }
}

async fn handle_tasks_cancel(state: AppState, request: JsonRpcRequest) -> Response {
    let params: TaskIdParams = match serde_json::from_value(request.params) {
        Ok(params) => params,
        Err(e) => return rpc_error(request.id, A2aError::invalid_params(e.to_string())),
    };

    match state.tasks.cancel_task(&params.id).await {
        Ok(task) => {
            info!(task_id = %params.id, "Task canceled");
            rpc_success(request.id, task)
        }
        Err(e) => rpc_error(request.id, e),
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn rpc_success<T: serde::Serialize>(id: Option<serde_json::Value>, result: T) -> Response {
    match serde_json::to_value(result) {
        Ok(value) => Json(JsonRpcResponse::success(id, value)).into_response(),
        Err(e) => rpc_error(id, A2aError::from(e)),
    }
}

fn rpc_error(id: Option<serde_json::Value>, error: A2aError) -> Response {
    let error: ErrorResponse = error.into();
    Json(JsonRpcResponse::error(id, error)).into_response()
}

/// Turn a task event stream into SSE frames, each carrying a JSON-RPC
/// response that wraps one streaming event. The stream ends when the
/// subscriber side closes the channel.
fn sse_event_stream(
    mut events: TaskEventStream,
    request_id: Option<serde_json::Value>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = events.recv().await {
            let envelope = match serde_json::to_value(&event) {
                Ok(value) => JsonRpcResponse::success(request_id.clone(), value),
                Err(e) => {
                    warn!(error = %e, "Failed to serialize streaming event");
                    continue;
                }
            };
            let data = serde_json::to_string(&envelope).unwrap_or_default();
            yield Ok(Event::default().data(data));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Part, StreamingEvent};

    struct EchoProcessor;

    #[async_trait]
    impl MessageProcessor for EchoProcessor {
        async fn process_message(
            &self,
            _ctx: CallContext,
            message: Message,
            options: ProcessOptions,
            _handler: Arc<dyn TaskHandler>,
        ) -> A2aResult<MessageProcessingResult> {
            let reply = Message::agent(format!("Echo: {}", message.text_content()));
            if options.streaming {
                Ok(MessageProcessingResult::single_message(reply))
            } else {
                Ok(MessageProcessingResult::unary(reply))
            }
        }
    }

    #[test]
    fn test_router_builds() {
        let card = AgentCard::new("test", "", "http://localhost");
        let server = A2aServer::new(card, Arc::new(EchoProcessor));
        let _router = server.router();
    }

    #[tokio::test]
    async fn test_echo_processor_unary() {
        let processor = EchoProcessor;
        let handler: Arc<dyn TaskHandler> = Arc::new(TaskManager::new());
        let result = processor
            .process_message(
                CallContext::with_user_id("u"),
                Message::user("hi").with_part(Part::text("!")),
                ProcessOptions { streaming: false },
                handler,
            )
            .await
            .unwrap();

        let reply = result.message.unwrap();
        assert_eq!(reply.text_content(), "Echo: hi!");
    }

    #[tokio::test]
    async fn test_single_message_result_yields_one_event() {
        let mut result = MessageProcessingResult::single_message(Message::agent("only"));
        let mut stream = result.streaming_events.take().unwrap();

        assert!(matches!(
            stream.recv().await,
            Some(StreamingEvent::Message(_))
        ));
        assert!(stream.recv().await.is_none());
    }
}
