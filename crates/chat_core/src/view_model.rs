use chrono::{DateTime, Utc};

use crate::{ChatMessage, Role, TurnId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatViewModel {
    pub header: &'static str,
    pub greeting: &'static str,
    pub messages: Vec<MessageView>,
    pub input: String,
    /// A reply is streaming; the send control is disabled.
    pub is_loading: bool,
    pub can_send: bool,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// `Sources: A, B`, present only when the reply cited documents.
    pub sources_line: Option<String>,
}

impl MessageView {
    pub(crate) fn from_message(message: &ChatMessage) -> Self {
        let sources_line = if message.sources.is_empty() {
            None
        } else {
            Some(format!("Sources: {}", message.sources.join(", ")))
        };
        Self {
            id: message.id,
            role: message.role,
            content: message.content.clone(),
            timestamp: message.timestamp,
            sources_line,
        }
    }
}
