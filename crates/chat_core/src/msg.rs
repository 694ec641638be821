use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the message draft.
    InputChanged(String),
    /// User asked to send the current draft.
    SendClicked { at: DateTime<Utc> },
    /// Engine progress: full transcript of the reply so far.
    ReplyProgress {
        turn_id: crate::TurnId,
        content: String,
    },
    /// Engine reached end of stream.
    ReplyFinished {
        turn_id: crate::TurnId,
        content: String,
        sources: Vec<String>,
    },
    /// Engine gave up on the reply.
    ReplyFailed {
        turn_id: crate::TurnId,
        reason: String,
    },
    /// The chat view is going away; abandon any reply in flight.
    ViewClosed,
    /// UI/render tick to coalesce rendering.
    Tick,
}
