//! # Trellis A2A - Agent2Agent wire protocol
//!
//! Wire-level support for the Agent2Agent (A2A) protocol: shared types, an
//! HTTP JSON-RPC server transport, and an HTTP client transport.
//!
//! ## Features
//!
//! - **Core types**: Message, Part, Task, Artifact, AgentCard, streaming
//!   events, and the JSON-RPC envelope
//! - **Server** (`server` feature): axum router serving the agent card and
//!   the JSON-RPC endpoint with SSE streaming, behind pluggable
//!   [`server::MessageProcessor`], [`server::TaskHandler`] and
//!   [`server::AuthProvider`] hooks
//! - **Client** (`client` feature): agent-card discovery, `message/send`,
//!   `message/stream`, `tasks/get`, `tasks/cancel`
//!
//! ## Protocol overview
//!
//! 1. **Agent Card**: a JSON document at a well-known path describing an
//!    agent's capabilities and streaming support
//! 2. **Messages**: user/agent exchanges composed of text, file and data
//!    parts
//! 3. **Tasks**: server-side handles for streaming exchanges, with a
//!    forward-only lifecycle
//! 4. **Artifacts**: chunks of agent output delivered while a task runs
//!
//! ## Example: constructing an agent card
//!
//! ```rust
//! use trellis_a2a::{AgentCard, AgentSkill};
//!
//! let card = AgentCard::new(
//!     "research-agent",
//!     "Answers research questions",
//!     "http://agent.example.com",
//! )
//! .with_streaming(true)
//! .with_skill(AgentSkill::new("summarize").with_description("Summarizes documents"));
//!
//! assert!(card.supports_streaming());
//! ```

pub mod error;
pub mod types;

// Client transport (requires client feature)
#[cfg(feature = "client")]
pub mod client;

// Server transport (requires server feature)
#[cfg(feature = "server")]
pub mod server;

// Re-export core types
pub use error::{A2aError, A2aResult, ErrorResponse};
pub use types::{
    AGENT_CARD_WELL_KNOWN_PATH, AgentCapabilities, AgentCard, AgentSkill, Artifact, DataPart,
    FileContent, FilePart, FileWithBytes, FileWithUri, JsonRpcRequest, JsonRpcResponse,
    METHOD_MESSAGE_SEND, METHOD_MESSAGE_STREAM, METHOD_TASKS_CANCEL, METHOD_TASKS_GET, Message,
    MessageSendParams, Part, Role, SendMessageResult, StreamingEvent, Task,
    TaskArtifactUpdateEvent, TaskIdParams, TaskState, TaskStatus, TaskStatusUpdateEvent, TextPart,
};

// Re-export client types
#[cfg(feature = "client")]
pub use client::{A2aClient, RequestOption};
