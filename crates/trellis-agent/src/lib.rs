//! # Trellis Agent - A2A bridge for local agents
//!
//! A bidirectional bridge between in-process conversational agents and the
//! Agent2Agent (A2A) wire protocol. It has two symmetric halves:
//!
//! - **Server**: wrap a local [`Agent`] so remote peers can invoke it over
//!   A2A, unary or streaming, with per-invocation task lifecycle, header
//!   authentication, batched streaming, and error shaping
//!   ([`server::A2aAgentServer`])
//! - **Client**: present a remote A2A peer as a local [`Agent`], discovering
//!   its capabilities from its agent card and re-emitting its replies as
//!   local events ([`client::RemoteA2aAgent`])
//!
//! Shared between them: the internal [`Event`]/[`Message`] model, the wire
//! converters in [`convert`] and [`client`], the batching [`EventTunnel`],
//! and user-identity propagation.
//!
//! ## Example: exposing an agent
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_agent::server::A2aAgentServer;
//!
//! let server = A2aAgentServer::builder()
//!     .with_agent(Arc::new(my_agent), true)
//!     .with_host("0.0.0.0:8080")
//!     .build()?;
//! server.serve().await?;
//! ```
//!
//! ## Example: calling a remote agent
//!
//! ```rust,ignore
//! use trellis_agent::client::RemoteA2aAgent;
//! use trellis_agent::{Agent, Invocation, Message, Session};
//!
//! let remote = RemoteA2aAgent::builder()
//!     .with_agent_card_url("http://peer.example.com:8080")
//!     .build()
//!     .await?;
//!
//! let invocation = Invocation::new(
//!     Session::new("ctx-1", "user-1"),
//!     Message::user("Hello, agent!"),
//! );
//! let mut events = remote.run(invocation).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event.response);
//! }
//! ```

pub mod agent;
pub mod client;
pub mod convert;
pub mod error;
pub mod event;
pub mod invocation;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod tunnel;

// Re-export core types
pub use agent::{Agent, AgentInfo, AgentRunner, Runner, ToolDeclaration};
pub use error::{AgentError, AgentResult};
pub use event::{Choice, Event, Response, ResponseError, Usage};
pub use invocation::{Invocation, RunOptions, Session};
pub use message::{ContentPart, FileSource, Message, Role, ToolCall};
pub use tunnel::EventTunnel;

// Re-export converter contracts
pub use convert::{
    A2aMessageConverter, ConvertOptions, DefaultA2aMessageConverter, DefaultEventA2aConverter,
    EventA2aConverter, OutboundPayload,
};

// Re-export session types
pub use session::{InMemorySessionService, SessionRecord, SessionService};

// Re-export registry helpers
pub use registry::{
    model_context_window, register_model_context_window, register_model_context_windows,
};
