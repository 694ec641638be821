use std::fmt;

use crate::decode::DecodeError;

pub type TurnId = u64;

/// Title of one cited document, in the order the server listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub title: String,
}

impl SourceEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnProgress {
    pub turn_id: TurnId,
    /// Full transcript so far; consumers replace their copy with it.
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(TurnProgress),
    TurnCompleted {
        turn_id: TurnId,
        result: Result<TurnOutcome, TurnError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnOutcome {
    pub transcript: String,
    /// Empty unless a complete sources block arrived before end of stream.
    pub sources: Vec<SourceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TurnError {
    pub kind: FailureKind,
    pub message: String,
}

impl TurnError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "turn cancelled")
    }
}

impl From<DecodeError> for TurnError {
    fn from(err: DecodeError) -> Self {
        Self::new(FailureKind::Decode, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidEndpoint,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: u64 },
    Decode,
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidEndpoint => write!(f, "invalid endpoint"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual})")
            }
            FailureKind::Decode => write!(f, "decode error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
