use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::view_model::{ChatViewModel, MessageView};

pub type TurnId = u64;

/// Fixed assistant greeting shown above the history.
pub const GREETING: &str = "Hello! How can I help you today?";

/// Page title used by both modes unless the config overrides it.
pub const DEFAULT_TITLE: &str = "Internal RAG Assistant";

/// Prefix of the text that replaces a reply that failed.
pub const ERROR_PREFIX: &str = "Network error";

/// Which assistant the widget talks to. Only changes static strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Rag,
    Infra,
}

impl ChatMode {
    pub fn label(self) -> &'static str {
        match self {
            ChatMode::Rag => "Assistant RAG",
            ChatMode::Infra => "Agent Infra",
        }
    }

    pub fn default_subtitle(self) -> &'static str {
        match self {
            ChatMode::Rag => "Query your internal company document base",
            ChatMode::Infra => "Technical questions about the RAG infrastructure and deployment",
        }
    }

    pub fn default_placeholder(self) -> &'static str {
        match self {
            ChatMode::Rag => "Ask a question about the company documents...",
            ChatMode::Infra => "Ask about the RAG infrastructure...",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Rag => write!(f, "rag"),
            ChatMode::Infra => write!(f, "infra"),
        }
    }
}

impl FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rag" => Ok(ChatMode::Rag),
            "infra" => Ok(ChatMode::Infra),
            other => Err(format!("unknown chat mode `{other}` (expected rag or infra)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Titles of cited documents; only set once a reply finished with sources.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatState {
    mode: ChatMode,
    input: String,
    messages: Vec<ChatMessage>,
    in_flight: Option<TurnId>,
    next_id: TurnId,
    dirty: bool,
}

impl ChatState {
    pub fn new(mode: ChatMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The assistant message currently being streamed, if any.
    pub fn in_flight(&self) -> Option<TurnId> {
        self.in_flight
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn view(&self) -> ChatViewModel {
        ChatViewModel {
            header: self.mode.label(),
            greeting: GREETING,
            messages: self.messages.iter().map(MessageView::from_message).collect(),
            input: self.input.clone(),
            is_loading: self.is_loading(),
            can_send: !self.is_loading() && !self.input.trim().is_empty(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and resets it.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_input(&mut self, text: String) {
        if self.input != text {
            self.input = text;
            self.dirty = true;
        }
    }

    /// Appends the user message and an empty assistant reply, returning the
    /// new turn and its query. Refused while a reply is streaming or when the
    /// draft is blank.
    pub(crate) fn begin_turn(&mut self, at: DateTime<Utc>) -> Option<(TurnId, String)> {
        if self.is_loading() || self.input.trim().is_empty() {
            return None;
        }
        let query = std::mem::take(&mut self.input);

        let user_id = self.allocate_id();
        self.messages.push(ChatMessage {
            id: user_id,
            role: Role::User,
            content: query.clone(),
            timestamp: at,
            sources: Vec::new(),
        });

        let turn_id = self.allocate_id();
        self.messages.push(ChatMessage {
            id: turn_id,
            role: Role::Assistant,
            content: String::new(),
            timestamp: at,
            sources: Vec::new(),
        });

        self.in_flight = Some(turn_id);
        self.dirty = true;
        Some((turn_id, query))
    }

    pub(crate) fn replace_reply(&mut self, turn_id: TurnId, content: String) {
        let Some(message) = self.streaming_reply(turn_id) else {
            return;
        };
        if message.content != content {
            message.content = content;
            self.dirty = true;
        }
    }

    pub(crate) fn finish_turn(&mut self, turn_id: TurnId, content: String, sources: Vec<String>) {
        let Some(message) = self.streaming_reply(turn_id) else {
            return;
        };
        message.content = content;
        if !sources.is_empty() {
            message.sources = sources;
        }
        self.in_flight = None;
        self.dirty = true;
    }

    pub(crate) fn fail_turn(&mut self, turn_id: TurnId, reason: &str) {
        let Some(message) = self.streaming_reply(turn_id) else {
            return;
        };
        message.content = format!("{ERROR_PREFIX}: {reason}");
        self.in_flight = None;
        self.dirty = true;
    }

    /// Stops waiting for the current reply, keeping whatever text it has.
    pub(crate) fn abandon_turn(&mut self) -> Option<TurnId> {
        let turn_id = self.in_flight.take()?;
        self.dirty = true;
        Some(turn_id)
    }

    fn streaming_reply(&mut self, turn_id: TurnId) -> Option<&mut ChatMessage> {
        if self.in_flight != Some(turn_id) {
            return None;
        }
        self.messages.iter_mut().rev().find(|m| m.id == turn_id)
    }

    fn allocate_id(&mut self) -> TurnId {
        self.next_id += 1;
        self.next_id
    }
}
