//! Content part types for the A2A protocol.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A content part within a message or artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    /// Text content
    Text(TextPart),

    /// File content, either inline bytes or a URI reference
    File(FilePart),

    /// Structured data
    Data(DataPart),
}

impl Part {
    /// Create a text part
    pub fn text(content: impl Into<String>) -> Self {
        Part::Text(TextPart {
            text: content.into(),
            metadata: HashMap::new(),
        })
    }

    /// Create a file part carrying inline bytes (base64-encoded on the wire)
    pub fn file_bytes(
        name: Option<String>,
        mime_type: Option<String>,
        bytes: impl AsRef<[u8]>,
    ) -> Self {
        Part::File(FilePart {
            file: FileContent::Bytes(FileWithBytes {
                name,
                mime_type,
                bytes: BASE64.encode(bytes.as_ref()),
            }),
            metadata: HashMap::new(),
        })
    }

    /// Create a file part referencing a URI
    pub fn file_uri(
        name: Option<String>,
        mime_type: Option<String>,
        uri: impl Into<String>,
    ) -> Self {
        Part::File(FilePart {
            file: FileContent::Uri(FileWithUri {
                name,
                mime_type,
                uri: uri.into(),
            }),
            metadata: HashMap::new(),
        })
    }

    /// Create a data part
    pub fn data(data: serde_json::Value) -> Self {
        Part::Data(DataPart {
            data,
            metadata: HashMap::new(),
        })
    }

    /// Get the text content if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(t) => Some(&t.text),
            _ => None,
        }
    }
}

/// Text content part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPart {
    /// The text content
    pub text: String,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// File content part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    /// The file payload, inline or by reference
    pub file: FileContent,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Payload of a file part.
///
/// Distinguished on the wire by the presence of `bytes` vs `uri`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    /// Inline file bytes
    Bytes(FileWithBytes),

    /// File reachable through a URI
    Uri(FileWithUri),
}

impl FileContent {
    /// File name, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            FileContent::Bytes(f) => f.name.as_deref(),
            FileContent::Uri(f) => f.name.as_deref(),
        }
    }

    /// MIME type, if any
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            FileContent::Bytes(f) => f.mime_type.as_deref(),
            FileContent::Uri(f) => f.mime_type.as_deref(),
        }
    }
}

/// File payload carried inline as base64
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileWithBytes {
    /// Optional file name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// MIME type of the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Base64-encoded file content
    pub bytes: String,
}

impl FileWithBytes {
    /// Decode the inline payload
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.bytes)
    }
}

/// File payload referenced by URI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileWithUri {
    /// Optional file name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// MIME type of the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// URI to the file
    pub uri: String,
}

/// Structured data part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPart {
    /// The structured data
    pub data: serde_json::Value,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_part_roundtrip() {
        let part = Part::text("Hello");
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"kind\":\"text\""));

        let parsed: Part = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_text(), Some("Hello"));
        assert_eq!(parsed, part);
    }

    #[test]
    fn test_file_bytes_roundtrip() {
        let part = Part::file_bytes(
            Some("report.pdf".to_string()),
            Some("application/pdf".to_string()),
            b"raw bytes",
        );
        let json = serde_json::to_string(&part).unwrap();
        let parsed: Part = serde_json::from_str(&json).unwrap();

        match parsed {
            Part::File(FilePart {
                file: FileContent::Bytes(f),
                ..
            }) => {
                assert_eq!(f.name.as_deref(), Some("report.pdf"));
                assert_eq!(f.decode().unwrap(), b"raw bytes");
            }
            other => panic!("expected inline file part, got {:?}", other),
        }
    }

    #[test]
    fn test_file_uri_deserializes_as_uri_variant() {
        let json = r#"{"kind":"file","file":{"uri":"https://example.com/a.png","mimeType":"image/png"}}"#;
        let parsed: Part = serde_json::from_str(json).unwrap();

        match parsed {
            Part::File(FilePart {
                file: FileContent::Uri(f),
                ..
            }) => {
                assert_eq!(f.uri, "https://example.com/a.png");
                assert_eq!(f.mime_type.as_deref(), Some("image/png"));
            }
            other => panic!("expected uri file part, got {:?}", other),
        }
    }

    #[test]
    fn test_data_part() {
        let part = Part::data(serde_json::json!({"key": "value"}));
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"kind\":\"data\""));

        let parsed: Part = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, part);
    }
}
