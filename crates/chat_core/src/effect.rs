#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start streaming the reply for `query` into assistant message `turn_id`.
    SubmitQuery { turn_id: crate::TurnId, query: String },
    /// Abort the in-flight reply; its late events are ignored.
    CancelTurn { turn_id: crate::TurnId },
}
