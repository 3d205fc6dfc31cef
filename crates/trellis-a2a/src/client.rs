//! A2A protocol client transport.
//!
//! HTTP client for talking to A2A agents over JSON-RPC: agent-card discovery
//! from the well-known path, unary `message/send`, and `message/stream` with
//! Server-Sent Events.
//!
//! The client does not retry failed requests; callers layer their own retry
//! policy on top when they need one. It is `Clone`-able and safe to share
//! across tasks; connections are pooled by `reqwest`.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{A2aError, A2aResult};
use crate::types::{
    AGENT_CARD_WELL_KNOWN_PATH, AgentCard, JsonRpcRequest, JsonRpcResponse, METHOD_MESSAGE_SEND,
    METHOD_MESSAGE_STREAM, METHOD_TASKS_CANCEL, METHOD_TASKS_GET, MessageSendParams,
    SendMessageResult, StreamingEvent, Task, TaskIdParams,
};

/// Default timeout for HTTP requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for streaming requests
const STREAMING_TIMEOUT: Duration = Duration::from_secs(300);

/// Buffer size of the channel carrying parsed streaming events
const STREAM_CHANNEL_SIZE: usize = 32;

/// Per-request option applied before dispatch.
///
/// Opaque request options supplied by callers are validated against this
/// type; anything else is rejected before any work starts.
#[derive(Debug, Clone)]
pub enum RequestOption {
    /// Add a header to the request
    Header {
        /// Header name
        name: String,
        /// Header value
        value: String,
    },

    /// Override the request timeout
    Timeout(Duration),
}

impl RequestOption {
    /// Convenience constructor for a header option
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        RequestOption::Header {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A2A protocol client
#[derive(Clone)]
pub struct A2aClient {
    base_url: Url,
    http: Client,
    card_path: String,
}

impl std::fmt::Debug for A2aClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("A2aClient")
            .field("base_url", &self.base_url.as_str())
            .field("card_path", &self.card_path)
            .finish()
    }
}

impl A2aClient {
    /// Create a new client for the given agent URL
    pub fn new(base_url: impl AsRef<str>) -> A2aResult<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(format!("trellis-a2a/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                A2aError::connection_error(format!("Failed to create HTTP client: {}", e))
            })?;

        Self::with_http_client(base_url, http)
    }

    /// Create a new client with a custom HTTP client
    pub fn with_http_client(base_url: impl AsRef<str>, http: Client) -> A2aResult<Self> {
        let base_url = Url::parse(base_url.as_ref())?;

        Ok(Self {
            base_url,
            http,
            card_path: AGENT_CARD_WELL_KNOWN_PATH.to_string(),
        })
    }

    /// Override the path the agent card is fetched from
    pub fn with_card_path(mut self, path: impl Into<String>) -> Self {
        self.card_path = path.into();
        self
    }

    /// The base URL this client talks to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL the agent card is fetched from: the base URL with any trailing
    /// slash trimmed, plus the card path.
    pub fn card_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.card_path
        )
    }

    // =========================================================================
    // Agent discovery
    // =========================================================================

    /// Fetch the agent card from the well-known endpoint
    pub async fn agent_card(&self) -> A2aResult<AgentCard> {
        let url = self.card_url();

        debug!(url = %url, "Fetching agent card");

        let response = self.http.get(&url).send().await.map_err(|e| {
            A2aError::connection_error(format!("Failed to fetch agent card: {}", e))
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(error_from_response(status, response).await);
        }

        let card: AgentCard = response
            .json()
            .await
            .map_err(|e| A2aError::protocol_error(format!("Failed to parse agent card: {}", e)))?;

        info!(
            name = %card.name,
            streaming = ?card.capabilities.streaming,
            skills = card.skills.len(),
            "Fetched agent card"
        );

        Ok(card)
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Send a message and wait for the whole reply
    pub async fn send_message(
        &self,
        params: MessageSendParams,
        options: &[RequestOption],
    ) -> A2aResult<SendMessageResult> {
        let request = JsonRpcRequest::new(METHOD_MESSAGE_SEND, serde_json::to_value(&params)?);
        let envelope = self.call(request, options).await?;
        decode_result(envelope)
    }

    /// Send a message and receive the reply as a stream of events.
    ///
    /// The returned channel yields parsed streaming events until the server
    /// ends the stream or the receiver is dropped.
    pub async fn stream_message(
        &self,
        params: MessageSendParams,
        options: &[RequestOption],
    ) -> A2aResult<mpsc::Receiver<A2aResult<StreamingEvent>>> {
        let request = JsonRpcRequest::new(METHOD_MESSAGE_STREAM, serde_json::to_value(&params)?);

        debug!(url = %self.base_url, "Opening message stream");

        let mut builder = self
            .http
            .post(self.base_url.clone())
            .timeout(STREAMING_TIMEOUT)
            .header("Accept", "text/event-stream")
            .json(&request);
        builder = apply_options(builder, options);

        let response = builder.send().await.map_err(|e| {
            A2aError::connection_error(format!("Failed to open stream: {}", e))
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(error_from_response(status, response).await);
        }

        let (tx, rx) = mpsc::channel::<A2aResult<StreamingEvent>>(STREAM_CHANNEL_SIZE);

        tokio::spawn(async move {
            use futures::StreamExt;

            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        let chunk_str = match std::str::from_utf8(&chunk) {
                            Ok(s) => s,
                            Err(e) => {
                                warn!(error = %e, "Invalid UTF-8 in SSE stream");
                                continue;
                            }
                        };

                        buffer.push_str(chunk_str);

                        while let Some(event) = parse_sse_event(&mut buffer) {
                            if tx.send(event).await.is_err() {
                                // Receiver dropped
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(A2aError::connection_error(format!(
                                "Stream error: {}",
                                e
                            ))))
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    // =========================================================================
    // Task management
    // =========================================================================

    /// Fetch the current state of a task
    pub async fn get_task(&self, task_id: impl Into<String>) -> A2aResult<Task> {
        let params = TaskIdParams { id: task_id.into() };
        let request = JsonRpcRequest::new(METHOD_TASKS_GET, serde_json::to_value(&params)?);
        let envelope = self.call(request, &[]).await?;
        decode_result(envelope)
    }

    /// Cancel a running task
    pub async fn cancel_task(&self, task_id: impl Into<String>) -> A2aResult<Task> {
        let params = TaskIdParams { id: task_id.into() };
        let request = JsonRpcRequest::new(METHOD_TASKS_CANCEL, serde_json::to_value(&params)?);
        let envelope = self.call(request, &[]).await?;
        decode_result(envelope)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn call(
        &self,
        request: JsonRpcRequest,
        options: &[RequestOption],
    ) -> A2aResult<JsonRpcResponse> {
        let mut builder = self.http.post(self.base_url.clone()).json(&request);
        builder = apply_options(builder, options);

        let response = builder
            .send()
            .await
            .map_err(|e| A2aError::connection_error(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(error_from_response(status, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| A2aError::protocol_error(format!("Failed to parse response: {}", e)))
    }
}

fn apply_options(
    mut builder: reqwest::RequestBuilder,
    options: &[RequestOption],
) -> reqwest::RequestBuilder {
    for option in options {
        builder = match option {
            RequestOption::Header { name, value } => builder.header(name.as_str(), value.as_str()),
            RequestOption::Timeout(timeout) => builder.timeout(*timeout),
        };
    }
    builder
}

fn decode_result<T: serde::de::DeserializeOwned>(envelope: JsonRpcResponse) -> A2aResult<T> {
    if let Some(error) = envelope.error {
        return Err(A2aError::protocol_error(format!(
            "JSON-RPC error {}: {}",
            error.code, error.message
        )));
    }
    let result = envelope
        .result
        .ok_or_else(|| A2aError::protocol_error("Response carried neither result nor error"))?;
    serde_json::from_value(result)
        .map_err(|e| A2aError::protocol_error(format!("Failed to decode result: {}", e)))
}

async fn error_from_response(status: StatusCode, response: reqwest::Response) -> A2aError {
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            A2aError::AuthenticationFailed { reason: body }
        }
        StatusCode::GATEWAY_TIMEOUT => A2aError::Timeout {
            timeout_ms: STREAMING_TIMEOUT.as_millis() as u64,
        },
        _ => A2aError::protocol_error(format!("HTTP {}: {}", status, body)),
    }
}

/// Parse the next complete SSE event out of the buffer.
///
/// Each `data:` payload is a JSON-RPC response wrapping one streaming event.
/// Returns `None` until a full event (terminated by a blank line) is
/// buffered.
fn parse_sse_event(buffer: &mut String) -> Option<A2aResult<StreamingEvent>> {
    loop {
        let event_end = buffer.find("\n\n")?;
        let event_str = buffer[..event_end].to_string();
        buffer.drain(..event_end + 2);

        let mut data = String::new();
        for line in event_str.lines() {
            if let Some(value) = line.strip_prefix("data:") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value.trim());
            }
        }

        // Keep-alive comments produce frames with no data; skip them
        // without stalling on later frames already in the buffer.
        if data.is_empty() {
            continue;
        }

        let envelope = match serde_json::from_str::<JsonRpcResponse>(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Failed to parse SSE payload");
                return Some(Err(A2aError::protocol_error(format!(
                    "Failed to parse streaming payload: {}",
                    e
                ))));
            }
        };

        return Some(decode_result::<StreamingEvent>(envelope));
    }
}
