//! Default inbound converter: wire message to internal agent message.

use tracing::debug;
use trellis_a2a::{FileContent, Message as A2aMessage, Part};

use super::A2aMessageConverter;
use crate::error::AgentResult;
use crate::message::{ContentPart, Message, Role};

/// Default wire-to-internal conversion.
///
/// The resulting message always carries `Role::User`; `content` is the
/// concatenation of all wire text parts, and `content_parts` preserves each
/// wire part's kind and payload. Invalid payloads are skipped with a debug
/// log, never fatally.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultA2aMessageConverter;

impl A2aMessageConverter for DefaultA2aMessageConverter {
    fn convert_to_agent_message(&self, message: &A2aMessage) -> AgentResult<Message> {
        let mut content = String::new();
        let mut content_parts = Vec::with_capacity(message.parts.len());

        for part in &message.parts {
            match part {
                Part::Text(text) => {
                    content.push_str(&text.text);
                    content_parts.push(ContentPart::text(&text.text));
                }
                Part::File(file) => match &file.file {
                    FileContent::Bytes(inline) => match inline.decode() {
                        Ok(bytes) => content_parts.push(ContentPart::file_bytes(
                            inline.name.clone(),
                            inline.mime_type.clone(),
                            bytes,
                        )),
                        Err(e) => {
                            debug!(
                                message_id = %message.message_id,
                                error = %e,
                                "Skipping file part with invalid base64 payload"
                            );
                        }
                    },
                    FileContent::Uri(reference) => content_parts.push(ContentPart::file_id(
                        reference.name.clone(),
                        reference.mime_type.clone(),
                        &reference.uri,
                    )),
                },
                Part::Data(data) => {
                    // Deterministic stringification: serde_json::Value keeps
                    // object keys sorted.
                    match serde_json::to_string(&data.data) {
                        Ok(text) => content_parts.push(ContentPart::text(text)),
                        Err(e) => {
                            debug!(
                                message_id = %message.message_id,
                                error = %e,
                                "Skipping unserializable data part"
                            );
                        }
                    }
                }
            }
        }

        Ok(Message {
            role: Some(Role::User),
            content,
            content_parts,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_a2a::Message as WireMessage;

    #[test]
    fn test_text_parts_concatenated() {
        let wire = WireMessage::user("Hello, ").with_part(Part::text("agent!"));
        let msg = DefaultA2aMessageConverter
            .convert_to_agent_message(&wire)
            .unwrap();

        assert_eq!(msg.role, Some(Role::User));
        assert_eq!(msg.content, "Hello, agent!");
        assert_eq!(msg.content_parts.len(), 2);
    }

    #[test]
    fn test_file_bytes_become_inline_file() {
        let wire = WireMessage::user("see file").with_part(Part::file_bytes(
            Some("a.txt".to_string()),
            Some("text/plain".to_string()),
            b"payload",
        ));
        let msg = DefaultA2aMessageConverter
            .convert_to_agent_message(&wire)
            .unwrap();

        match &msg.content_parts[1] {
            ContentPart::File {
                name,
                mime_type,
                source: crate::message::FileSource::Bytes(bytes),
            } => {
                assert_eq!(name.as_deref(), Some("a.txt"));
                assert_eq!(mime_type.as_deref(), Some("text/plain"));
                assert_eq!(bytes, b"payload");
            }
            other => panic!("expected inline file, got {:?}", other),
        }
    }

    #[test]
    fn test_file_uri_becomes_file_id() {
        let wire = WireMessage::user("").with_part(Part::file_uri(
            None,
            Some("image/png".to_string()),
            "https://example.com/x.png",
        ));
        let msg = DefaultA2aMessageConverter
            .convert_to_agent_message(&wire)
            .unwrap();

        match &msg.content_parts[1] {
            ContentPart::File {
                source: crate::message::FileSource::FileId(id),
                ..
            } => assert_eq!(id, "https://example.com/x.png"),
            other => panic!("expected file reference, got {:?}", other),
        }
    }

    #[test]
    fn test_data_part_rendered_as_text() {
        let wire = WireMessage::user("")
            .with_part(Part::data(serde_json::json!({"b": 2, "a": 1})));
        let msg = DefaultA2aMessageConverter
            .convert_to_agent_message(&wire)
            .unwrap();

        // Keys are sorted, so the rendering is deterministic.
        assert_eq!(msg.content_parts[1].as_text(), Some(r#"{"a":1,"b":2}"#));
        // Data parts do not contribute to the concatenated text content.
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_invalid_base64_skipped_not_fatal() {
        let mut wire = WireMessage::user("ok");
        wire.parts.push(Part::File(trellis_a2a::FilePart {
            file: FileContent::Bytes(trellis_a2a::FileWithBytes {
                name: None,
                mime_type: None,
                bytes: "!!! not base64 !!!".to_string(),
            }),
            metadata: Default::default(),
        }));

        let msg = DefaultA2aMessageConverter
            .convert_to_agent_message(&wire)
            .unwrap();
        assert_eq!(msg.content, "ok");
        assert_eq!(msg.content_parts.len(), 1);
    }
}
