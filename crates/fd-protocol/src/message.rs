//! Conversation messages and agent reply shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::record::FleetRecord;

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in the conversation history. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<FleetRecord>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), None)
    }

    pub fn assistant_with_records(content: impl Into<String>, records: Vec<FleetRecord>) -> Self {
        Self::new(Role::Assistant, content.into(), Some(records))
    }

    fn new(role: Role, content: String, records: Option<Vec<FleetRecord>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: Utc::now(),
            records,
        }
    }
}

/// Body returned by the agent endpoint, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    /// A bare JSON string, or a body that was not JSON at all.
    Text(String),
    /// A JSON object, normally `{ "response": ..., "session_id"?: ... }`.
    Object(Map<String, Value>),
}

impl AgentReply {
    /// Classify a raw response body. Never fails: anything that is not a JSON
    /// string or object is kept verbatim as text.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::String(text)) => Self::Text(text),
            Ok(Value::Object(map)) => Self::Object(map),
            _ => Self::Text(body.to_string()),
        }
    }

    /// The free-text part of the reply.
    pub fn response_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Object(map) => map.get("response").and_then(Value::as_str),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Object(map) => map.get("session_id").and_then(Value::as_str),
        }
    }
}

/// Reply after interpretation: display text plus any extracted records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpretedReply {
    pub text: String,
    pub records: Option<Vec<FleetRecord>>,
    pub session_id: Option<String>,
}

impl InterpretedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn has_records(&self) -> bool {
        self.records.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_helpers() {
        let user = ChatMessage::user("hello");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "hello");
        assert!(user.records.is_none());

        let assistant = ChatMessage::assistant_with_records("found", vec![FleetRecord::new("V1")]);
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.records.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn message_ids_are_unique() {
        let a = ChatMessage::user("same");
        let b = ChatMessage::user("same");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn message_without_records_omits_field() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert!(!json.contains("records"));
    }

    #[test]
    fn reply_from_object_body() {
        let reply = AgentReply::from_body(r#"{"response":"hi","session_id":"s-1"}"#);
        assert_eq!(reply.response_text(), Some("hi"));
        assert_eq!(reply.session_id(), Some("s-1"));
    }

    #[test]
    fn reply_from_bare_string_body() {
        let reply = AgentReply::from_body(r#""just text""#);
        assert_eq!(reply, AgentReply::Text("just text".to_string()));
        assert_eq!(reply.session_id(), None);
    }

    #[test]
    fn reply_from_non_json_body_keeps_raw_text() {
        let reply = AgentReply::from_body("plain words {");
        assert_eq!(reply.response_text(), Some("plain words {"));
    }

    #[test]
    fn reply_from_json_array_keeps_raw_text() {
        let reply = AgentReply::from_body("[1,2]");
        assert_eq!(reply, AgentReply::Text("[1,2]".to_string()));
    }
}
