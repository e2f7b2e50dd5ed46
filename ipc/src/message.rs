//! Message ids, headers and bodies

use crate::MessageError;
use codec::{deserialize_map, serialize_map, Value, ValueMap};
use core_types::{new_uuid_string, NodeEnvironment, NodeId, Vector3};
use std::collections::BTreeSet;
use std::fmt;

/// Well-known header fields
pub mod headers {
    pub const ID: &str = "Id";
    pub const ORIGIN_ID: &str = "OriginId";
    pub const ORIGIN_NAME: &str = "OriginName";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const Z: &str = "z";
    pub const SPEED: &str = "speed";
    pub const SAFE_RADIUS: &str = "SafeRadius";
    pub const PATH: &str = "Path";
    pub const TARGET_ID: &str = "TargetId";
    pub const TARGET_NAME: &str = "TargetName";
    pub const STATUS: &str = "status";
    pub const RESPONDING_TO_ID: &str = "RespondingToId";
}

/// Well-known body fields
pub mod body {
    /// Routine text carried by a `command` request
    pub const COMMAND: &str = "Command";
}

/// Unique identifier for a message
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a new random message ID
    pub fn new() -> Self {
        Self(new_uuid_string())
    }

    /// Wraps an id read off the wire
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Header, body and channel tags shared by requests and responses
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub header: ValueMap,
    pub body: ValueMap,
    /// Channels this message travels on, or arrived on
    pub channels: BTreeSet<String>,
}

impl Message {
    /// Creates a message, generating an id unless the header has one
    pub fn new(mut header: ValueMap, body: ValueMap) -> Self {
        if !header.contains_key(headers::ID) {
            header.insert(headers::ID.to_string(), Value::from(MessageId::new().0));
        }
        Self {
            header,
            body,
            channels: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> MessageId {
        MessageId::from_string(self.header_str(headers::ID))
    }

    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        self.header.insert(key.to_string(), Value::from(value.into()));
    }

    pub fn set_body(&mut self, key: &str, value: impl Into<String>) {
        self.body.insert(key.to_string(), Value::from(value.into()));
    }

    pub fn has_header(&self, key: &str) -> bool {
        self.header.contains_key(key)
    }

    /// Header text, or `""` when absent or not text
    pub fn header_str(&self, key: &str) -> &str {
        text(&self.header, key)
    }

    /// Header as an integer, or 0
    pub fn header_i64(&self, key: &str) -> i64 {
        self.header_str(key).trim().parse().unwrap_or(0)
    }

    /// Header as a float, or 0.0
    pub fn header_f64(&self, key: &str) -> f64 {
        self.header_str(key).trim().parse().unwrap_or(0.0)
    }

    /// Body text, or `""` when absent or not text
    pub fn body_str(&self, key: &str) -> &str {
        text(&self.body, key)
    }

    pub fn body_i64(&self, key: &str) -> i64 {
        self.body_str(key).trim().parse().unwrap_or(0)
    }

    pub fn body_f64(&self, key: &str) -> f64 {
        self.body_str(key).trim().parse().unwrap_or(0.0)
    }

    /// The sender's node id
    pub fn origin_id(&self) -> NodeId {
        NodeId::new(self.header_i64(headers::ORIGIN_ID))
    }

    /// The sender's display name
    pub fn origin_name(&self) -> &str {
        self.header_str(headers::ORIGIN_NAME)
    }

    /// The sender's position, speed and safe radius at send time
    pub fn origin_environment(&self) -> NodeEnvironment {
        NodeEnvironment {
            position: Vector3::new(
                self.header_f64(headers::X),
                self.header_f64(headers::Y),
                self.header_f64(headers::Z),
            ),
            speed: self.header_f64(headers::SPEED),
            safe_radius: self.header_f64(headers::SAFE_RADIUS),
        }
    }

    /// Encodes the `<header>..</header><body>..</body>` part
    pub(crate) fn encode_sections(&self) -> String {
        format!(
            "<header>{}</header><body>{}</body>",
            serialize_map(&self.header),
            serialize_map(&self.body)
        )
    }

    /// Decodes what [`Message::encode_sections`] wrote
    pub(crate) fn decode_sections(text: &str) -> Result<Self, MessageError> {
        let (header_text, rest) = section(text, "header", false)?;
        let (body_text, _) = section(rest, "body", true)?;
        Ok(Self::new(
            decode_map("header", header_text)?,
            decode_map("body", body_text)?,
        ))
    }
}

fn text<'a>(map: &'a ValueMap, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Returns the content of `<tag>..</tag>` and the text after the section
///
/// With `last_close`, the last closing tag ends the section, so section text
/// may itself mention the tag.
fn section<'a>(
    text: &'a str,
    tag: &'static str,
    last_close: bool,
) -> Result<(&'a str, &'a str), MessageError> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = text.find(&open).ok_or(MessageError::MissingSection(tag))? + open.len();
    let after_open = &text[start..];
    let end = if last_close {
        after_open.rfind(&close)
    } else {
        after_open.find(&close)
    }
    .ok_or(MessageError::MissingSection(tag))?;

    Ok((&after_open[..end], &after_open[end + close.len()..]))
}

fn decode_map(section: &'static str, text: &str) -> Result<ValueMap, MessageError> {
    if text.trim().is_empty() {
        return Ok(ValueMap::new());
    }
    deserialize_map(text).map_err(|source| MessageError::Malformed { section, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_generated_and_unique() {
        let a = Message::new(ValueMap::new(), ValueMap::new());
        let b = Message::new(ValueMap::new(), ValueMap::new());
        assert!(!a.id().as_str().is_empty());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_existing_id_is_kept() {
        let mut header = ValueMap::new();
        header.insert(headers::ID.into(), "abc".into());
        let message = Message::new(header, ValueMap::new());
        assert_eq!(message.id(), MessageId::from_string("abc"));
    }

    #[test]
    fn test_typed_accessors_default_to_zero() {
        let mut message = Message::default();
        message.set_header(headers::ORIGIN_ID, "42");
        message.set_header(headers::X, "1.5");
        message.set_header(headers::SPEED, "fast");
        message.set_body("count", " 7 ");

        assert_eq!(message.header_i64(headers::ORIGIN_ID), 42);
        assert_eq!(message.origin_id(), NodeId::new(42));
        assert_eq!(message.header_f64(headers::X), 1.5);
        assert_eq!(message.header_f64(headers::SPEED), 0.0);
        assert_eq!(message.header_str("missing"), "");
        assert_eq!(message.body_i64("count"), 7);
        assert_eq!(message.body_f64("missing"), 0.0);
    }

    #[test]
    fn test_origin_environment() {
        let mut message = Message::default();
        message.set_header(headers::X, "1");
        message.set_header(headers::Y, "2");
        message.set_header(headers::Z, "3");
        message.set_header(headers::SAFE_RADIUS, "50");
        let env = message.origin_environment();
        assert_eq!(env.position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(env.safe_radius, 50.0);
        assert_eq!(env.speed, 0.0);
    }

    #[test]
    fn test_sections_round_trip_with_tag_text_in_body() {
        let mut message = Message::new(ValueMap::new(), ValueMap::new());
        message.set_body(body::COMMAND, "print </body> <header>");

        let decoded = Message::decode_sections(&message.encode_sections()).unwrap();
        assert_eq!(decoded.header, message.header);
        assert_eq!(decoded.body, message.body);
    }

    #[test]
    fn test_missing_sections() {
        assert_eq!(
            Message::decode_sections("<body>{}</body>"),
            Err(MessageError::MissingSection("header"))
        );
        assert_eq!(
            Message::decode_sections("<header>{}</header>"),
            Err(MessageError::MissingSection("body"))
        );
    }

    #[test]
    fn test_empty_sections_decode_as_empty_maps() {
        let message = Message::decode_sections("<header></header><body></body>").unwrap();
        assert!(message.body.is_empty());
        assert!(message.has_header(headers::ID));
    }
}
