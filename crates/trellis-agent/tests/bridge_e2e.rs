//! End-to-end tests for the A2A bridge.
//!
//! A scripted backend agent is exposed through the bridge server on a real
//! loopback listener, and a remote agent client talks to it over HTTP,
//! covering unary and streaming exchanges, identity propagation,
//! transfer-state filtering, and error shaping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use trellis_agent::client::RemoteA2aAgent;
use trellis_agent::server::{A2aAgentServer, DEFAULT_ERROR_REPLY, ShutdownHandle};
use trellis_agent::{
    Agent, AgentError, AgentInfo, AgentResult, Choice, Event, Invocation, Message, Response,
    Session,
};

// =============================================================================
// Scripted backend agents
// =============================================================================

/// What the backend does with each invocation.
#[derive(Clone)]
enum Behavior {
    /// Reply with one whole message.
    Unary(String),
    /// Stream delta chunks, then a terminal event.
    Stream(Vec<String>),
    /// Fail the run outright.
    Fail(String),
}

/// Details of an invocation as observed by the backend.
#[derive(Clone)]
struct SeenInvocation {
    user_id: String,
    context_id: String,
    runtime_state: HashMap<String, serde_json::Value>,
}

struct ScriptedAgent {
    behavior: Behavior,
    seen: Mutex<Vec<SeenInvocation>>,
}

impl ScriptedAgent {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<SeenInvocation> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo::new("scripted-backend", "Backend used by bridge tests")
    }

    async fn run(&self, invocation: Invocation) -> AgentResult<mpsc::Receiver<Event>> {
        self.seen.lock().unwrap().push(SeenInvocation {
            user_id: invocation.session.user_id.clone(),
            context_id: invocation.session.id.clone(),
            runtime_state: invocation.runtime_state.clone(),
        });

        let behavior = self.behavior.clone();
        let invocation_id = invocation.invocation_id.clone();

        match behavior {
            Behavior::Fail(reason) => Err(AgentError::agent(reason)),
            Behavior::Unary(text) => {
                let (tx, rx) = mpsc::channel(1);
                let event = Event::new(
                    invocation_id,
                    "scripted-backend",
                    Response {
                        choices: vec![Choice {
                            message: Message::assistant(text),
                            ..Default::default()
                        }],
                        done: true,
                        ..Default::default()
                    },
                );
                tx.send(event).await.expect("receiver alive");
                Ok(rx)
            }
            Behavior::Stream(chunks) => {
                let (tx, rx) = mpsc::channel(chunks.len() + 1);
                for chunk in chunks {
                    let event = Event::new(
                        invocation_id.clone(),
                        "scripted-backend",
                        Response {
                            choices: vec![Choice {
                                delta: Message::assistant(chunk),
                                ..Default::default()
                            }],
                            is_partial: true,
                            ..Default::default()
                        },
                    );
                    tx.send(event).await.expect("receiver alive");
                }
                let terminal = Event::new(
                    invocation_id,
                    "scripted-backend",
                    Response {
                        done: true,
                        ..Default::default()
                    },
                );
                tx.send(terminal).await.expect("receiver alive");
                Ok(rx)
            }
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    url: String,
    shutdown: ShutdownHandle,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}

async fn start_server(
    agent: Arc<ScriptedAgent>,
    streaming: bool,
    user_id_header: Option<&str>,
) -> Harness {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let mut builder = A2aAgentServer::builder()
        .with_agent(agent, streaming)
        .with_host(addr.to_string());
    if let Some(header) = user_id_header {
        builder = builder.with_user_id_header(header);
    }
    let server = builder.build().expect("build server");
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        server.serve_on(listener).await.expect("serve");
    });

    Harness {
        url: format!("http://{}", addr),
        shutdown,
    }
}

async fn connect(url: &str) -> RemoteA2aAgent {
    RemoteA2aAgent::builder()
        .with_agent_card_url(url)
        .build()
        .await
        .expect("connect")
}

async fn collect(mut rx: mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn user_invocation(text: &str) -> Invocation {
    Invocation::new(Session::new("ctx-e2e", "user-1"), Message::user(text))
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_unary_echo() {
    let backend = ScriptedAgent::new(Behavior::Unary(
        "Mock response from backend agent".to_string(),
    ));
    let harness = start_server(Arc::clone(&backend), false, None).await;
    let remote = connect(&harness.url).await;

    let events = collect(
        remote
            .run(user_invocation("Hello, agent!"))
            .await
            .expect("run"),
    )
    .await;

    assert_eq!(events.len(), 1);
    let response = events[0].response.as_ref().unwrap();
    assert!(response.error.is_none());
    assert_eq!(
        response.choices[0].message.content,
        "Mock response from backend agent"
    );
    assert!(!events[0].is_tool_call());
}

#[tokio::test]
async fn test_streamed_sentence() {
    let chunks = ["Hello ", "from ", "streaming ", "agent: ", "content"];
    let backend = ScriptedAgent::new(Behavior::Stream(
        chunks.iter().map(|c| c.to_string()).collect(),
    ));
    let harness = start_server(Arc::clone(&backend), true, None).await;
    let remote = connect(&harness.url).await;
    assert!(remote.uses_streaming());

    let events = collect(
        remote
            .run(user_invocation("stream please"))
            .await
            .expect("run"),
    )
    .await;

    // Intermediate delta events preserve producer order.
    let deltas: Vec<String> = events
        .iter()
        .filter_map(|e| e.response.as_ref())
        .filter(|r| r.is_partial)
        .filter_map(|r| r.choices.first())
        .map(|c| c.delta.content.clone())
        .collect();
    assert!(!deltas.is_empty());
    assert!(deltas.len() <= chunks.len());
    assert_eq!(deltas.concat(), "Hello from streaming agent: content");

    // Exactly one synthetic final event, last, carrying the aggregate.
    let final_event = events.last().unwrap();
    let response = final_event.response.as_ref().unwrap();
    assert!(response.done);
    assert!(!response.is_partial);
    assert_eq!(
        response.choices[0].message.content,
        "Hello from streaming agent: content"
    );
    let done_count = events
        .iter()
        .filter(|e| e.response.as_ref().is_some_and(|r| r.done))
        .count();
    assert_eq!(done_count, 1);
}

#[tokio::test]
async fn test_transfer_state_leak() {
    let backend = ScriptedAgent::new(Behavior::Unary("ok".to_string()));
    let harness = start_server(Arc::clone(&backend), false, None).await;

    let remote = RemoteA2aAgent::builder()
        .with_agent_card_url(&harness.url)
        .with_transfer_state_keys(["session_key", "user_pref"])
        .build()
        .await
        .expect("connect");

    let invocation = user_invocation("carry my state").with_runtime_state(HashMap::from([
        ("session_key".to_string(), serde_json::json!("v1")),
        ("user_pref".to_string(), serde_json::json!("dark")),
        ("secret".to_string(), serde_json::json!("SENSITIVE")),
    ]));

    collect(remote.run(invocation).await.expect("run")).await;

    // The server feeds wire metadata into the backend's runtime state, so
    // the backend sees exactly the transferred keys.
    let seen = backend.seen();
    assert_eq!(seen.len(), 1);
    let state = &seen[0].runtime_state;
    assert_eq!(state.get("session_key"), Some(&serde_json::json!("v1")));
    assert_eq!(state.get("user_pref"), Some(&serde_json::json!("dark")));
    assert!(!state.contains_key("secret"));
}

#[tokio::test]
async fn test_user_id_header_propagation() {
    let backend = ScriptedAgent::new(Behavior::Unary("ok".to_string()));
    let harness = start_server(Arc::clone(&backend), false, Some("X-User-Identifier")).await;

    let remote = RemoteA2aAgent::builder()
        .with_agent_card_url(&harness.url)
        .with_user_id_header("X-User-Identifier")
        .build()
        .await
        .expect("connect");

    let invocation = Invocation::new(
        Session::new("ctx-e2e", "user-456"),
        Message::user("who am I?"),
    );
    collect(remote.run(invocation).await.expect("run")).await;

    let seen = backend.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].user_id, "user-456");
    assert_eq!(seen[0].context_id, "ctx-e2e");
}

#[tokio::test]
async fn test_mismatched_user_header_mints_identity() {
    let backend = ScriptedAgent::new(Behavior::Unary("ok".to_string()));
    // Server reads X-User-Identifier, client sends the default X-User-ID.
    let harness = start_server(Arc::clone(&backend), false, Some("X-User-Identifier")).await;
    let remote = connect(&harness.url).await;

    collect(remote.run(user_invocation("hi")).await.expect("run")).await;

    let seen = backend.seen();
    assert_eq!(seen.len(), 1);
    // A fresh identity was minted instead of the client-sent one.
    assert!(!seen[0].user_id.is_empty());
    assert_ne!(seen[0].user_id, "user-1");
}

#[tokio::test]
async fn test_server_error_shaping_unary() {
    let backend = ScriptedAgent::new(Behavior::Fail("backend exploded".to_string()));
    let harness = start_server(Arc::clone(&backend), false, None).await;
    let remote = connect(&harness.url).await;

    let events = collect(remote.run(user_invocation("boom")).await.expect("run")).await;

    assert_eq!(events.len(), 1);
    let response = events[0].response.as_ref().unwrap();
    assert!(response.error.is_none());
    assert_eq!(response.choices[0].message.content, DEFAULT_ERROR_REPLY);
}

#[tokio::test]
async fn test_server_error_shaping_streaming() {
    let backend = ScriptedAgent::new(Behavior::Fail("backend exploded".to_string()));
    let harness = start_server(Arc::clone(&backend), true, None).await;
    let remote = connect(&harness.url).await;
    assert!(remote.uses_streaming());

    let events = collect(remote.run(user_invocation("boom")).await.expect("run")).await;

    // The shaped error arrives as a normal, non-error event with the canned
    // text; the stream then ends with the synthetic final event.
    let shaped = events
        .iter()
        .find_map(|e| e.response.as_ref())
        .expect("at least one response");
    assert!(shaped.error.is_none());
    assert_eq!(shaped.choices[0].message.content, DEFAULT_ERROR_REPLY);
}

#[tokio::test]
async fn test_card_served_at_well_known_path() {
    let backend = ScriptedAgent::new(Behavior::Unary("ok".to_string()));
    let harness = start_server(Arc::clone(&backend), true, None).await;

    let card: trellis_a2a::AgentCard =
        reqwest::get(format!("{}/.well-known/agent.json", harness.url))
            .await
            .expect("fetch card")
            .json()
            .await
            .expect("parse card");

    assert_eq!(card.name, "scripted-backend");
    assert_eq!(card.capabilities.streaming, Some(true));
    assert!(!card.skills.is_empty());
}

// =============================================================================
// Card resolution edge cases (mocked peer)
// =============================================================================

mod card_resolution {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_card_fetch_uses_exact_well_known_url() {
        let mock = MockServer::start().await;
        let card = serde_json::json!({
            "name": "mock-peer",
            "description": "from the card",
            "url": "",
            "capabilities": {"streaming": false}
        });
        Mock::given(method("GET"))
            .and(path("/.well-known/agent.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(card))
            .expect(1)
            .mount(&mock)
            .await;

        let remote = RemoteA2aAgent::builder()
            .with_agent_card_url(mock.uri())
            .build()
            .await
            .expect("resolve");

        // Name and description fill from the card; the empty card URL is
        // substituted with the configured base URL.
        assert_eq!(remote.info().name, "mock-peer");
        assert_eq!(remote.info().description, "from the card");
        assert_eq!(remote.card().url, mock.uri().trim_end_matches('/'));
        assert!(!remote.uses_streaming());
    }

    #[tokio::test]
    async fn test_name_override_beats_card() {
        let mock = MockServer::start().await;
        let card = serde_json::json!({
            "name": "mock-peer",
            "url": format!("{}/", mock.uri())
        });
        Mock::given(method("GET"))
            .and(path("/.well-known/agent.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(card))
            .mount(&mock)
            .await;

        let remote = RemoteA2aAgent::builder()
            .with_agent_card_url(mock.uri())
            .with_name("my-alias")
            .build()
            .await
            .expect("resolve");

        assert_eq!(remote.info().name, "my-alias");
    }

    #[tokio::test]
    async fn test_card_fetch_requires_http_200() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/agent.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock)
            .await;

        let result = RemoteA2aAgent::builder()
            .with_agent_card_url(mock.uri())
            .build()
            .await;
        assert!(matches!(result, Err(AgentError::Transport(_))));
    }

    #[tokio::test]
    async fn test_custom_card_path() {
        let mock = MockServer::start().await;
        let card = serde_json::json!({
            "name": "mock-peer",
            "url": mock.uri()
        });
        Mock::given(method("GET"))
            .and(path("/.well-known/agent-card.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(card))
            .expect(1)
            .mount(&mock)
            .await;

        let remote = RemoteA2aAgent::builder()
            .with_agent_card_url(mock.uri())
            .with_card_path("/.well-known/agent-card.json")
            .build()
            .await
            .expect("resolve");

        assert_eq!(remote.info().name, "mock-peer");
    }
}
