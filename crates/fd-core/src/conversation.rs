//! Append-only record of one chat conversation.

use fd_protocol::{ChatMessage, InterpretedReply};

#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> &ChatMessage {
        self.push(ChatMessage::user(content))
    }

    /// Append an interpreted agent reply, keeping its records when present.
    pub fn push_assistant(&mut self, reply: InterpretedReply) -> &ChatMessage {
        let message = match reply.records {
            Some(records) => ChatMessage::assistant_with_records(reply.text, records),
            None => ChatMessage::assistant(reply.text),
        };
        self.push(message)
    }

    /// Append an assistant-side notice, e.g. a failed exchange.
    pub fn push_notice(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.push(ChatMessage::assistant(text))
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }
}
