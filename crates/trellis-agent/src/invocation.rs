//! Invocations: one logical request flowing into a local agent.

use std::any::Any;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::message::Message;

/// Session an invocation runs inside.
///
/// The session ID doubles as the A2A context ID grouping related
/// invocations into one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Session / context identifier
    pub id: String,

    /// End-user identity the invocation acts for
    pub user_id: String,
}

impl Session {
    /// Create a session.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Opaque per-run options.
#[derive(Default)]
pub struct RunOptions {
    /// Runtime state forwarded to the agent; on the server side this is
    /// populated from the inbound wire message's metadata.
    pub runtime_state: HashMap<String, serde_json::Value>,

    /// Opaque per-request options for the underlying A2A client. Each entry
    /// must be a `trellis_a2a::client::RequestOption`; anything else is
    /// rejected before dispatch.
    pub a2a_request_options: Vec<Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("runtime_state_keys", &self.runtime_state.keys().collect::<Vec<_>>())
            .field("a2a_request_options", &self.a2a_request_options.len())
            .finish()
    }
}

/// One logical request into an agent.
///
/// Immutable once `run` begins; destroyed when its event channel closes.
#[derive(Debug)]
pub struct Invocation {
    /// Unique invocation identifier
    pub invocation_id: String,

    /// Session the invocation belongs to
    pub session: Session,

    /// Input message
    pub message: Message,

    /// Opaque key/value state available to the agent
    pub runtime_state: HashMap<String, serde_json::Value>,

    /// Per-run options
    pub run_options: RunOptions,

    /// Token cancelled when the caller abandons the invocation
    pub cancel: CancellationToken,
}

impl Invocation {
    /// Create an invocation with a generated ID.
    pub fn new(session: Session, message: Message) -> Self {
        Self {
            invocation_id: Uuid::new_v4().to_string(),
            session,
            message,
            runtime_state: HashMap::new(),
            run_options: RunOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach runtime state.
    pub fn with_runtime_state(
        mut self,
        state: HashMap<String, serde_json::Value>,
    ) -> Self {
        self.runtime_state = state;
        self
    }

    /// Attach run options.
    pub fn with_run_options(mut self, options: RunOptions) -> Self {
        self.run_options = options;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
