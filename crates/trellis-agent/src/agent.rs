//! Agent and runner contracts.
//!
//! The agent runtime itself lives elsewhere; the bridge only consumes these
//! contracts: an [`Agent`] turns an invocation into a stream of events, and
//! a [`Runner`] wraps agent dispatch with session bookkeeping.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::AgentResult;
use crate::event::Event;
use crate::invocation::{Invocation, RunOptions, Session};
use crate::message::Message;
use crate::session::SessionService;

/// Static description of an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentInfo {
    /// Agent name
    pub name: String,
    /// Human-readable description
    pub description: String,
}

impl AgentInfo {
    /// Create agent info.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Declaration of a tool an agent can call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDeclaration {
    /// Tool name
    pub name: String,
    /// What the tool does
    pub description: String,
}

/// A local conversational agent.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Static information about this agent.
    fn info(&self) -> AgentInfo;

    /// Run one invocation, producing a stream of events. The producer closes
    /// the channel when the invocation completes.
    async fn run(&self, invocation: Invocation) -> AgentResult<mpsc::Receiver<Event>>;

    /// Tools this agent can call.
    fn tools(&self) -> Vec<ToolDeclaration> {
        Vec::new()
    }

    /// Sub-agents this agent can delegate to.
    fn sub_agents(&self) -> Vec<Arc<dyn Agent>> {
        Vec::new()
    }
}

/// Dispatches invocations into an agent on behalf of a user and session.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run a message for `user_id` within `context_id`.
    async fn run(
        &self,
        user_id: &str,
        context_id: &str,
        message: Message,
        runtime_state: HashMap<String, serde_json::Value>,
    ) -> AgentResult<mpsc::Receiver<Event>>;
}

/// Default runner: ensures the session exists, then builds the invocation
/// and hands it to the agent.
pub struct AgentRunner {
    agent: Arc<dyn Agent>,
    sessions: Arc<dyn SessionService>,
}

impl AgentRunner {
    /// Create a runner over an agent and a session service.
    pub fn new(agent: Arc<dyn Agent>, sessions: Arc<dyn SessionService>) -> Self {
        Self { agent, sessions }
    }

    /// The wrapped agent.
    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }
}

#[async_trait]
impl Runner for AgentRunner {
    async fn run(
        &self,
        user_id: &str,
        context_id: &str,
        message: Message,
        runtime_state: HashMap<String, serde_json::Value>,
    ) -> AgentResult<mpsc::Receiver<Event>> {
        self.sessions.ensure_session(user_id, context_id).await?;

        let invocation = Invocation::new(Session::new(context_id, user_id), message)
            .with_runtime_state(runtime_state)
            .with_run_options(RunOptions::default());

        self.agent.run(invocation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Choice, Response};
    use crate::session::InMemorySessionService;

    struct OneShotAgent;

    #[async_trait]
    impl Agent for OneShotAgent {
        fn info(&self) -> AgentInfo {
            AgentInfo::new("one-shot", "Replies once")
        }

        async fn run(&self, invocation: Invocation) -> AgentResult<mpsc::Receiver<Event>> {
            let (tx, rx) = mpsc::channel(1);
            let event = Event::new(
                invocation.invocation_id.clone(),
                "one-shot",
                Response {
                    choices: vec![Choice {
                        message: Message::assistant("pong"),
                        ..Default::default()
                    }],
                    done: true,
                    ..Default::default()
                },
            );
            tx.send(event).await.expect("receiver alive");
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn test_runner_creates_session_and_dispatches() {
        let sessions = Arc::new(InMemorySessionService::new());
        let runner = AgentRunner::new(Arc::new(OneShotAgent), sessions.clone());

        let mut rx = runner
            .run("user-1", "ctx-1", Message::user("ping"), HashMap::new())
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.response.unwrap().choices[0].message.content,
            "pong"
        );
        assert!(rx.recv().await.is_none());
        assert!(sessions.get_session("user-1", "ctx-1").await.is_some());
    }
}
