//! Remote agent client: present a remote A2A peer as a local [`Agent`].
//!
//! The client resolves the peer's agent card (or accepts one directly),
//! selects unary or streaming transport, translates invocations into wire
//! messages, and re-emits the peer's replies as local events.

mod convert;

pub use convert::{
    A2aEventConverter, DefaultA2aEventConverter, DefaultInvocationA2aConverter,
    InvocationA2aConverter,
};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use trellis_a2a::client::{A2aClient, RequestOption};
use trellis_a2a::{AgentCard, MessageSendParams};

use crate::agent::{Agent, AgentInfo};
use crate::error::{AgentError, AgentResult};
use crate::event::{Choice, Event, Response};
use crate::invocation::Invocation;
use crate::message::Message;
use crate::server::DEFAULT_USER_ID_HEADER;

/// Default capacity of the streaming output channel.
const DEFAULT_STREAM_BUFFER: usize = 1024;

/// Hook receiving each streamed response; its return value is what gets
/// appended to the aggregated final content.
pub type StreamingResponseHandler = Arc<dyn Fn(&Response) -> AgentResult<String> + Send + Sync>;

/// Builder for [`RemoteA2aAgent`].
///
/// Exactly one of [`with_agent_card`](Self::with_agent_card) and
/// [`with_agent_card_url`](Self::with_agent_card_url) is required; the URL
/// form fetches the card during [`build`](Self::build).
pub struct RemoteA2aAgentBuilder {
    card: Option<AgentCard>,
    card_url: Option<String>,
    card_path: Option<String>,
    name: Option<String>,
    description: Option<String>,
    enable_streaming: Option<bool>,
    stream_buffer: usize,
    transfer_state_keys: Vec<String>,
    user_id_header: String,
    response_handler: Option<StreamingResponseHandler>,
    outbound: Option<Arc<dyn InvocationA2aConverter>>,
    inbound: Option<Arc<dyn A2aEventConverter>>,
    extra_options: Vec<RequestOption>,
}

impl RemoteA2aAgentBuilder {
    fn new() -> Self {
        Self {
            card: None,
            card_url: None,
            card_path: None,
            name: None,
            description: None,
            enable_streaming: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            transfer_state_keys: Vec::new(),
            user_id_header: DEFAULT_USER_ID_HEADER.to_string(),
            response_handler: None,
            outbound: None,
            inbound: None,
            extra_options: Vec::new(),
        }
    }

    /// Supply the peer's card directly.
    pub fn with_agent_card(mut self, card: AgentCard) -> Self {
        self.card = Some(card);
        self
    }

    /// Resolve the peer's card from its base URL.
    pub fn with_agent_card_url(mut self, url: impl Into<String>) -> Self {
        self.card_url = Some(url.into());
        self
    }

    /// Override the well-known path the card is fetched from.
    pub fn with_card_path(mut self, path: impl Into<String>) -> Self {
        self.card_path = Some(path.into());
        self
    }

    /// Override the local agent name (defaults to the card's name).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the local description (defaults to the card's).
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Force streaming on or off, overriding the card's advertisement.
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.enable_streaming = Some(enabled);
        self
    }

    /// Capacity of the streaming output channel (default 1024).
    pub fn with_stream_buffer_size(mut self, size: usize) -> Self {
        self.stream_buffer = size.max(1);
        self
    }

    /// Runtime-state keys copied into outbound wire metadata.
    pub fn with_transfer_state_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transfer_state_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Header carrying the user identity on outbound requests.
    pub fn with_user_id_header(mut self, header: impl Into<String>) -> Self {
        self.user_id_header = header.into();
        self
    }

    /// Hook observing each streamed response and controlling aggregation.
    pub fn with_streaming_response_handler(mut self, handler: StreamingResponseHandler) -> Self {
        self.response_handler = Some(handler);
        self
    }

    /// Replace the invocation-to-wire converter.
    pub fn with_a2a_converter(mut self, converter: Arc<dyn InvocationA2aConverter>) -> Self {
        self.outbound = Some(converter);
        self
    }

    /// Replace the wire-to-event converter.
    pub fn with_event_converter(mut self, converter: Arc<dyn A2aEventConverter>) -> Self {
        self.inbound = Some(converter);
        self
    }

    /// Options applied to every outbound request.
    pub fn with_request_options(mut self, options: Vec<RequestOption>) -> Self {
        self.extra_options = options;
        self
    }

    /// Resolve the card if needed and assemble the agent.
    pub async fn build(self) -> AgentResult<RemoteA2aAgent> {
        let (client, card) = match (self.card, self.card_url) {
            (Some(_), Some(_)) => {
                return Err(AgentError::config(
                    "supply either an agent card or an agent card URL, not both",
                ));
            }
            (None, None) => {
                return Err(AgentError::config(
                    "an agent card or an agent card URL is required",
                ));
            }
            (Some(card), None) => {
                if card.url.is_empty() {
                    return Err(AgentError::config("agent card has no URL"));
                }
                let client = new_client(&card.url, self.card_path.as_deref())?;
                (client, card)
            }
            (None, Some(url)) => {
                let probe = new_client(&url, self.card_path.as_deref())?;
                let mut card = probe.agent_card().await.map_err(|e| {
                    AgentError::transport(format!("failed to resolve agent card: {}", e))
                })?;
                if card.url.is_empty() {
                    card.url = url.trim_end_matches('/').to_string();
                }
                let client = new_client(&card.url, self.card_path.as_deref())?;
                (client, card)
            }
        };

        let info = AgentInfo::new(
            self.name.unwrap_or_else(|| card.name.clone()),
            self.description.unwrap_or_else(|| card.description.clone()),
        );

        info!(
            agent = %info.name,
            url = %card.url,
            streaming = ?card.capabilities.streaming,
            "Connected to remote A2A agent"
        );

        let outbound = self.outbound.unwrap_or_else(|| {
            Arc::new(DefaultInvocationA2aConverter::new(
                self.transfer_state_keys.clone(),
            ))
        });
        let inbound = self
            .inbound
            .unwrap_or_else(|| Arc::new(DefaultA2aEventConverter));

        Ok(RemoteA2aAgent {
            info,
            card,
            client,
            streaming_override: self.enable_streaming,
            stream_buffer: self.stream_buffer,
            user_id_header: self.user_id_header,
            response_handler: self.response_handler,
            outbound,
            inbound,
            extra_options: self.extra_options,
        })
    }
}

fn new_client(url: &str, card_path: Option<&str>) -> AgentResult<A2aClient> {
    let mut client = A2aClient::new(url)
        .map_err(|e| AgentError::config(format!("invalid agent URL {}: {}", url, e)))?;
    if let Some(path) = card_path {
        client = client.with_card_path(path);
    }
    Ok(client)
}

/// A remote A2A peer behaving as a local [`Agent`].
pub struct RemoteA2aAgent {
    info: AgentInfo,
    card: AgentCard,
    client: A2aClient,
    streaming_override: Option<bool>,
    stream_buffer: usize,
    user_id_header: String,
    response_handler: Option<StreamingResponseHandler>,
    outbound: Arc<dyn InvocationA2aConverter>,
    inbound: Arc<dyn A2aEventConverter>,
    extra_options: Vec<RequestOption>,
}

impl RemoteA2aAgent {
    /// Start configuring a remote agent.
    pub fn builder() -> RemoteA2aAgentBuilder {
        RemoteA2aAgentBuilder::new()
    }

    /// The resolved agent card.
    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    /// Whether invocations will use the streaming transport: an explicit
    /// override wins, then the card's advertisement, then non-streaming.
    pub fn uses_streaming(&self) -> bool {
        self.streaming_override
            .or(self.card.capabilities.streaming)
            .unwrap_or(false)
    }

    /// Validate opaque request options and combine them with the standing
    /// ones. Each opaque entry must be a `client::RequestOption`.
    fn resolve_request_options(
        &self,
        invocation: &Invocation,
    ) -> AgentResult<Vec<RequestOption>> {
        let mut options = self.extra_options.clone();

        for (i, opaque) in invocation.run_options.a2a_request_options.iter().enumerate() {
            match opaque.downcast_ref::<RequestOption>() {
                Some(option) => options.push(option.clone()),
                None => {
                    return Err(AgentError::config(format!(
                        "A2ARequestOptions[{}] is not a valid client::RequestOption",
                        i
                    )));
                }
            }
        }

        if !invocation.session.user_id.is_empty() {
            options.push(RequestOption::header(
                self.user_id_header.clone(),
                invocation.session.user_id.clone(),
            ));
        }

        Ok(options)
    }

    fn spawn_unary(
        &self,
        invocation: Invocation,
        params: MessageSendParams,
        options: Vec<RequestOption>,
    ) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(1);
        let client = self.client.clone();
        let inbound = Arc::clone(&self.inbound);
        let author = self.info.name.clone();

        tokio::spawn(async move {
            let cancel = invocation.cancel.clone();
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = client.send_message(params, &options) => result,
            };

            let event = match result {
                Ok(reply) => match inbound.convert_result(&reply, &invocation) {
                    Ok(mut event) => {
                        event.author = author.clone();
                        event
                    }
                    Err(e) => Event::error(
                        invocation.invocation_id.clone(),
                        author.clone(),
                        format!("failed to convert reply: {}", e),
                    ),
                },
                Err(e) => Event::error(
                    invocation.invocation_id.clone(),
                    author.clone(),
                    format!("request failed: {}", e),
                ),
            };

            let _ = tx.send(event).await;
        });

        rx
    }

    fn spawn_streaming(
        &self,
        invocation: Invocation,
        params: MessageSendParams,
        options: Vec<RequestOption>,
    ) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let client = self.client.clone();
        let inbound = Arc::clone(&self.inbound);
        let response_handler = self.response_handler.clone();
        let author = self.info.name.clone();

        tokio::spawn(async move {
            let cancel = invocation.cancel.clone();

            let mut wire_events = match client.stream_message(params, &options).await {
                Ok(events) => events,
                Err(e) => {
                    let _ = tx
                        .send(Event::error(
                            invocation.invocation_id.clone(),
                            author.clone(),
                            format!("failed to open stream: {}", e),
                        ))
                        .await;
                    return;
                }
            };

            let mut aggregated = String::new();

            loop {
                let wire_event = tokio::select! {
                    _ = cancel.cancelled() => return,
                    maybe = wire_events.recv() => match maybe {
                        Some(event) => event,
                        None => break,
                    },
                };

                let wire_event = match wire_event {
                    Ok(event) => event,
                    Err(e) => {
                        let _ = tx
                            .send(Event::error(
                                invocation.invocation_id.clone(),
                                author.clone(),
                                format!("stream failed: {}", e),
                            ))
                            .await;
                        return;
                    }
                };

                match inbound.convert_stream_event(&wire_event, &invocation) {
                    Ok(Some(mut event)) => {
                        event.author = author.clone();

                        if let Some(response) = &event.response {
                            if let Some(handler) = &response_handler {
                                match handler(response) {
                                    Ok(text) => aggregated.push_str(&text),
                                    Err(e) => {
                                        let _ = tx
                                            .send(Event::error(
                                                invocation.invocation_id.clone(),
                                                author.clone(),
                                                format!("response handler failed: {}", e),
                                            ))
                                            .await;
                                        return;
                                    }
                                }
                            } else if let Some(choice) = response.choices.first() {
                                aggregated.push_str(&choice.delta.content);
                            }
                        }

                        let send = tokio::select! {
                            _ = cancel.cancelled() => return,
                            send = tx.send(event) => send,
                        };
                        if send.is_err() {
                            debug!("Event receiver dropped; stopping stream");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let _ = tx
                            .send(Event::error(
                                invocation.invocation_id.clone(),
                                author.clone(),
                                format!("failed to convert streaming event: {}", e),
                            ))
                            .await;
                        return;
                    }
                }
            }

            // Stream ended: synthesize the final aggregate event.
            let final_event = Event::new(
                invocation.invocation_id.clone(),
                author,
                Response {
                    object: "chat.completion".to_string(),
                    choices: vec![Choice {
                        message: Message::assistant(aggregated),
                        ..Default::default()
                    }],
                    done: true,
                    is_partial: false,
                    ..Default::default()
                },
            );
            let _ = tx.send(final_event).await;
        });

        rx
    }
}

#[async_trait]
impl Agent for RemoteA2aAgent {
    fn info(&self) -> AgentInfo {
        self.info.clone()
    }

    async fn run(&self, invocation: Invocation) -> AgentResult<mpsc::Receiver<Event>> {
        let streaming = self.uses_streaming();
        let wire = self.outbound.convert_to_a2a_message(&invocation)?;
        let options = self.resolve_request_options(&invocation)?;
        let params = MessageSendParams::new(wire);

        debug!(
            agent = %self.info.name,
            streaming,
            invocation_id = %invocation.invocation_id,
            "Dispatching invocation to remote agent"
        );

        if streaming {
            Ok(self.spawn_streaming(invocation, params, options))
        } else {
            Ok(self.spawn_unary(invocation, params, options))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::Session;

    fn card(streaming: Option<bool>) -> AgentCard {
        let mut card = AgentCard::new("remote", "a remote peer", "http://127.0.0.1:1");
        card.capabilities.streaming = streaming;
        card
    }

    async fn agent_with_card(card: AgentCard) -> RemoteA2aAgent {
        RemoteA2aAgent::builder()
            .with_agent_card(card)
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_requires_exactly_one_card_source() {
        assert!(matches!(
            RemoteA2aAgent::builder().build().await,
            Err(AgentError::Config(_))
        ));

        assert!(matches!(
            RemoteA2aAgent::builder()
                .with_agent_card(card(None))
                .with_agent_card_url("http://127.0.0.1:1")
                .build()
                .await,
            Err(AgentError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_card_without_url_rejected() {
        let result = RemoteA2aAgent::builder()
            .with_agent_card(AgentCard::new("x", "", ""))
            .build()
            .await;
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_streaming_selection_order() {
        // Explicit override dominates the card.
        let agent = RemoteA2aAgent::builder()
            .with_agent_card(card(Some(true)))
            .with_streaming(false)
            .build()
            .await
            .unwrap();
        assert!(!agent.uses_streaming());

        // Card advertisement is next.
        let agent = agent_with_card(card(Some(true))).await;
        assert!(agent.uses_streaming());
        let agent = agent_with_card(card(Some(false))).await;
        assert!(!agent.uses_streaming());

        // Default is non-streaming.
        let agent = agent_with_card(card(None)).await;
        assert!(!agent.uses_streaming());
    }

    #[tokio::test]
    async fn test_name_defaults_from_card() {
        let agent = agent_with_card(card(None)).await;
        assert_eq!(agent.info().name, "remote");
        assert_eq!(agent.info().description, "a remote peer");

        let agent = RemoteA2aAgent::builder()
            .with_agent_card(card(None))
            .with_name("local-alias")
            .build()
            .await
            .unwrap();
        assert_eq!(agent.info().name, "local-alias");
    }

    #[tokio::test]
    async fn test_invalid_request_option_rejected_synchronously() {
        let agent = agent_with_card(card(None)).await;

        let mut invocation =
            Invocation::new(Session::new("ctx-1", "user-1"), Message::user("hi"));
        invocation
            .run_options
            .a2a_request_options
            .push(Box::new("not-an-option".to_string()));

        let err = agent.run(invocation).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("A2ARequestOptions[0]"));
        assert!(text.contains("not a valid client::RequestOption"));
    }

    #[tokio::test]
    async fn test_valid_request_options_accepted() {
        let agent = agent_with_card(card(None)).await;

        let mut invocation =
            Invocation::new(Session::new("ctx-1", "user-1"), Message::user("hi"));
        invocation
            .run_options
            .a2a_request_options
            .push(Box::new(RequestOption::header("X-Extra", "1")));

        let options = agent.resolve_request_options(&invocation).unwrap();
        // The opaque option plus the injected user-ID header.
        assert_eq!(options.len(), 2);
        assert!(matches!(
            &options[1],
            RequestOption::Header { name, value } if name == "X-User-ID" && value == "user-1"
        ));
    }

    #[tokio::test]
    async fn test_user_header_skipped_when_user_empty() {
        let agent = agent_with_card(card(None)).await;
        let invocation = Invocation::new(Session::new("ctx-1", ""), Message::user("hi"));
        let options = agent.resolve_request_options(&invocation).unwrap();
        assert!(options.is_empty());
    }
}
