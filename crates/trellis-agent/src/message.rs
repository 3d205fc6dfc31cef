//! Internal message model produced and consumed by local agents.

use serde::{Deserialize, Serialize};

/// Role of an internal message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user input
    User,
    /// Agent output
    Assistant,
    /// Tool result
    Tool,
    /// System instruction
    System,
}

/// A message inside the local agent runtime.
///
/// `content` carries the concatenated text; `content_parts` preserves the
/// structured form of multi-part inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the sender
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Concatenated text content
    #[serde(default)]
    pub content: String,

    /// Structured content parts, parallel to `content`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_parts: Vec<ContentPart>,

    /// Tool invocations requested by the agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Identifier of the tool call this message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
}

impl Message {
    /// Create a user message with text content.
    pub fn user(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            role: Some(Role::User),
            content: text.clone(),
            content_parts: vec![ContentPart::text(text)],
            ..Default::default()
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            role: Some(Role::Assistant),
            content: text,
            ..Default::default()
        }
    }

    /// Check whether the message is tool-related: it requests tool calls,
    /// answers one, or carries the tool role.
    pub fn is_tool_related(&self) -> bool {
        !self.tool_calls.is_empty() || self.tool_id.is_some() || self.role == Some(Role::Tool)
    }
}

/// Structured content of an internal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentPart {
    /// Plain text
    Text {
        /// The text content
        text: String,
    },

    /// File payload, inline or by reference
    File {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        source: FileSource,
    },

    /// Image payload
    Image {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        source: FileSource,
    },

    /// Audio payload
    Audio {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        source: FileSource,
    },

    /// Arbitrary structured data
    Data {
        /// The data payload
        value: serde_json::Value,
    },
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Create a file part with inline bytes.
    pub fn file_bytes(
        name: Option<String>,
        mime_type: Option<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        ContentPart::File {
            name,
            mime_type,
            source: FileSource::Bytes(data.into()),
        }
    }

    /// Create a file part referencing an uploaded file.
    pub fn file_id(
        name: Option<String>,
        mime_type: Option<String>,
        file_id: impl Into<String>,
    ) -> Self {
        ContentPart::File {
            name,
            mime_type,
            source: FileSource::FileId(file_id.into()),
        }
    }

    /// Get the text content if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Where a file/image/audio payload lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSource {
    /// Raw bytes carried inline
    Bytes(Vec<u8>),
    /// Reference to an already-uploaded file
    FileId(String),
}

/// A tool invocation requested by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool arguments
    #[serde(default)]
    pub arguments: serde_json::Value,
}
