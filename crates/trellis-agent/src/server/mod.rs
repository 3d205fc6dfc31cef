//! Server assembly: expose a local agent over the A2A protocol.
//!
//! Builds the agent card from the agent's own description, wires the
//! processor, task manager and auth provider into the wire transport, and
//! manages the serve/shutdown lifecycle.

mod auth;
mod processor;

pub use auth::{DEFAULT_USER_ID_HEADER, HeaderAuthProvider};
pub use processor::{
    AgentMessageProcessor, DEFAULT_ERROR_REPLY, DefaultErrorHandler, ErrorHandler,
};

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use trellis_a2a::server::{A2aServer, MessageProcessor, ServerConfig, TaskManager};
use trellis_a2a::{AgentCard, AgentSkill};

use crate::agent::{Agent, AgentRunner, Runner};
use crate::convert::{A2aMessageConverter, EventA2aConverter};
use crate::error::{AgentError, AgentResult};
use crate::session::{InMemorySessionService, SessionService};
use crate::tunnel::EventTunnel;

/// Middleware decorating the message processor.
pub type ProcessorHook =
    Box<dyn Fn(Arc<dyn MessageProcessor>) -> Arc<dyn MessageProcessor> + Send + Sync>;

/// Builder for [`A2aAgentServer`].
///
/// `agent` and `host` are required; everything else has a default.
pub struct A2aAgentServerBuilder {
    agent: Option<Arc<dyn Agent>>,
    host: Option<String>,
    enable_streaming: Option<bool>,
    agent_card: Option<AgentCard>,
    session_service: Option<Arc<dyn SessionService>>,
    runner: Option<Arc<dyn Runner>>,
    task_manager: Option<Arc<TaskManager>>,
    processor: Option<Arc<dyn MessageProcessor>>,
    hooks: Vec<ProcessorHook>,
    inbound_converter: Option<Arc<dyn A2aMessageConverter>>,
    outbound_converter: Option<Arc<dyn EventA2aConverter>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    user_id_header: String,
    tunnel: EventTunnel,
    debug_logging: bool,
    server_config: ServerConfig,
}

impl A2aAgentServerBuilder {
    fn new() -> Self {
        Self {
            agent: None,
            host: None,
            enable_streaming: None,
            agent_card: None,
            session_service: None,
            runner: None,
            task_manager: None,
            processor: None,
            hooks: Vec::new(),
            inbound_converter: None,
            outbound_converter: None,
            error_handler: None,
            user_id_header: DEFAULT_USER_ID_HEADER.to_string(),
            tunnel: EventTunnel::default(),
            debug_logging: false,
            server_config: ServerConfig::default(),
        }
    }

    /// Set the agent to expose and whether the card advertises streaming.
    pub fn with_agent(mut self, agent: Arc<dyn Agent>, enable_streaming: bool) -> Self {
        self.agent = Some(agent);
        self.enable_streaming = Some(enable_streaming);
        self
    }

    /// Set the listen host, e.g. `127.0.0.1:8080`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Supply the agent card directly instead of building one.
    pub fn with_agent_card(mut self, card: AgentCard) -> Self {
        self.agent_card = Some(card);
        self
    }

    /// Replace the session service.
    pub fn with_session_service(mut self, sessions: Arc<dyn SessionService>) -> Self {
        self.session_service = Some(sessions);
        self
    }

    /// Replace the runner dispatching into the agent.
    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Replace the task manager.
    pub fn with_task_manager(mut self, tasks: Arc<TaskManager>) -> Self {
        self.task_manager = Some(tasks);
        self
    }

    /// Replace the message processor outright. Hooks still apply on top.
    pub fn with_processor(mut self, processor: Arc<dyn MessageProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Decorate the processor; hooks compose in registration order.
    pub fn with_process_message_hook(mut self, hook: ProcessorHook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Replace the inbound (wire-to-agent) converter.
    pub fn with_a2a_converter(mut self, converter: Arc<dyn A2aMessageConverter>) -> Self {
        self.inbound_converter = Some(converter);
        self
    }

    /// Replace the outbound (event-to-wire) converter.
    pub fn with_event_converter(mut self, converter: Arc<dyn EventA2aConverter>) -> Self {
        self.outbound_converter = Some(converter);
        self
    }

    /// Change the header the user identity is read from.
    pub fn with_user_id_header(mut self, header: impl Into<String>) -> Self {
        self.user_id_header = header.into();
        self
    }

    /// Replace the error handler.
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Replace the streaming batch tunnel.
    pub fn with_tunnel(mut self, tunnel: EventTunnel) -> Self {
        self.tunnel = tunnel;
        self
    }

    /// Toggle per-event debug logging.
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Override transport-level settings (card path, CORS).
    pub fn with_server_config(mut self, config: ServerConfig) -> Self {
        self.server_config = config;
        self
    }

    /// Validate and assemble the server.
    pub fn build(self) -> AgentResult<A2aAgentServer> {
        let agent = self
            .agent
            .ok_or_else(|| AgentError::config("agent is required"))?;
        let host = self
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AgentError::config("host is required"))?;

        let card = self
            .agent_card
            .unwrap_or_else(|| build_agent_card(agent.as_ref(), &host, self.enable_streaming));

        let mut processor: Arc<dyn MessageProcessor> = match self.processor {
            Some(processor) => processor,
            None => {
                let sessions = self
                    .session_service
                    .unwrap_or_else(|| Arc::new(InMemorySessionService::new()));
                let runner = self
                    .runner
                    .unwrap_or_else(|| Arc::new(AgentRunner::new(Arc::clone(&agent), sessions)));

                let mut processor = AgentMessageProcessor::new(runner)
                    .with_tunnel(self.tunnel)
                    .with_debug_logging(self.debug_logging);
                if let Some(converter) = self.inbound_converter {
                    processor = processor.with_inbound_converter(converter);
                }
                if let Some(converter) = self.outbound_converter {
                    processor = processor.with_outbound_converter(converter);
                }
                if let Some(handler) = self.error_handler {
                    processor = processor.with_error_handler(handler);
                }
                Arc::new(processor)
            }
        };
        for hook in &self.hooks {
            processor = hook(processor);
        }

        let tasks = self.task_manager.unwrap_or_else(|| Arc::new(TaskManager::new()));
        let auth = Arc::new(HeaderAuthProvider::new(self.user_id_header));

        let inner = A2aServer::new(card.clone(), processor)
            .with_auth_provider(auth)
            .with_task_manager(tasks)
            .with_config(self.server_config);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(A2aAgentServer {
            inner,
            card,
            host,
            shutdown_tx,
            shutdown_rx,
        })
    }
}

/// Build the agent card from the agent's own description: one default skill
/// plus one per declared tool.
fn build_agent_card(agent: &dyn Agent, host: &str, streaming: Option<bool>) -> AgentCard {
    let info = agent.info();
    let mut card = AgentCard::new(&info.name, &info.description, format!("http://{}", host));
    card.capabilities.streaming = streaming;

    card = card.with_skill(
        AgentSkill::new("default").with_description(format!("{}: {}", info.name, info.description)),
    );
    for tool in agent.tools() {
        card = card.with_skill(AgentSkill::new(tool.name).with_description(tool.description));
    }

    card
}

/// A local agent exposed over the A2A protocol.
pub struct A2aAgentServer {
    inner: A2aServer,
    card: AgentCard,
    host: String,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl A2aAgentServer {
    /// Start configuring a server.
    pub fn builder() -> A2aAgentServerBuilder {
        A2aAgentServerBuilder::new()
    }

    /// The card this server advertises.
    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    /// Handle for stopping the server; cheap to clone around.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Bind the configured host and serve until the listener fails or
    /// [`ShutdownHandle::shutdown`] is called.
    pub async fn serve(self) -> AgentResult<()> {
        let listener = tokio::net::TcpListener::bind(&self.host)
            .await
            .map_err(|e| AgentError::transport(format!("failed to bind {}: {}", self.host, e)))?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve_on(self, listener: tokio::net::TcpListener) -> AgentResult<()> {
        info!(agent = %self.card.name, host = %self.host, "Exposing agent over A2A");

        let mut shutdown_rx = self.shutdown_rx;
        let shutdown = async move {
            // Only an explicit shutdown flips the flag; a dropped sender
            // keeps the server running.
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        };

        self.inner.serve_with_shutdown(listener, shutdown).await?;
        info!("A2A server stopped");
        Ok(())
    }
}

/// Stops a running [`A2aAgentServer`]; idempotent.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request a graceful shutdown. Calling this more than once is harmless.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentInfo, ToolDeclaration};
    use crate::event::Event;
    use crate::invocation::Invocation;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct CardOnlyAgent;

    #[async_trait]
    impl Agent for CardOnlyAgent {
        fn info(&self) -> AgentInfo {
            AgentInfo::new("card-agent", "An agent used for card tests")
        }

        async fn run(&self, _invocation: Invocation) -> AgentResult<mpsc::Receiver<Event>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }

        fn tools(&self) -> Vec<ToolDeclaration> {
            vec![ToolDeclaration {
                name: "search".to_string(),
                description: "Searches the web".to_string(),
            }]
        }
    }

    #[test]
    fn test_build_requires_agent_and_host() {
        assert!(matches!(
            A2aAgentServer::builder().build(),
            Err(AgentError::Config(_))
        ));

        assert!(matches!(
            A2aAgentServer::builder()
                .with_agent(Arc::new(CardOnlyAgent), true)
                .build(),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn test_card_built_from_agent_info() {
        let server = A2aAgentServer::builder()
            .with_agent(Arc::new(CardOnlyAgent), true)
            .with_host("127.0.0.1:8080")
            .build()
            .unwrap();

        let card = server.card();
        assert_eq!(card.name, "card-agent");
        assert_eq!(card.url, "http://127.0.0.1:8080");
        assert_eq!(card.capabilities.streaming, Some(true));
        // One default skill plus one per tool.
        assert_eq!(card.skills.len(), 2);
        assert_eq!(card.skills[0].name, "default");
        assert_eq!(card.skills[1].name, "search");
    }

    #[test]
    fn test_supplied_card_wins() {
        let card = AgentCard::new("custom", "custom card", "http://elsewhere");
        let server = A2aAgentServer::builder()
            .with_agent(Arc::new(CardOnlyAgent), false)
            .with_host("127.0.0.1:8080")
            .with_agent_card(card.clone())
            .build()
            .unwrap();

        assert_eq!(server.card(), &card);
    }

    #[test]
    fn test_shutdown_handle_is_idempotent() {
        let server = A2aAgentServer::builder()
            .with_agent(Arc::new(CardOnlyAgent), false)
            .with_host("127.0.0.1:8080")
            .build()
            .unwrap();

        let handle = server.shutdown_handle();
        handle.shutdown();
        handle.shutdown();
    }
}
