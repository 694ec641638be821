use std::io;

use chat_core::{Effect, Msg};
use chat_engine::{EngineEvent, EngineHandle, FailureKind, TransportSettings, TurnError};
use chat_logging::{chat_info, chat_warn};

pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(settings: TransportSettings) -> io::Result<Self> {
        Ok(Self::with_engine(EngineHandle::new(settings)?))
    }

    pub fn with_engine(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SubmitQuery { turn_id, query } => {
                    chat_info!("SubmitQuery turn_id={} query_len={}", turn_id, query.len());
                    self.engine.submit(turn_id, query);
                }
                Effect::CancelTurn { turn_id } => {
                    chat_info!("CancelTurn turn_id={}", turn_id);
                    self.engine.cancel(turn_id);
                }
            }
        }
    }

    /// Everything the engine reported since the last call, as core messages.
    pub fn drain_events(&self) -> Vec<Msg> {
        let mut inbox = Vec::new();
        while let Some(event) = self.engine.try_recv() {
            inbox.extend(map_event(event));
        }
        inbox
    }
}

fn map_event(event: EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::Progress(progress) => Some(Msg::ReplyProgress {
            turn_id: progress.turn_id,
            content: progress.transcript,
        }),
        EngineEvent::TurnCompleted { turn_id, result } => match result {
            Ok(outcome) => Some(Msg::ReplyFinished {
                turn_id,
                content: outcome.transcript,
                sources: outcome.sources.into_iter().map(|s| s.title).collect(),
            }),
            // The core already let go of a cancelled turn.
            Err(err) if err.kind == FailureKind::Cancelled => None,
            Err(err) => {
                chat_warn!("Turn {} failed: {}", turn_id, err);
                Some(Msg::ReplyFailed {
                    turn_id,
                    reason: failure_reason(&err),
                })
            }
        },
    }
}

/// Text shown after the `Network error:` prefix.
fn failure_reason(err: &TurnError) -> String {
    match err.kind {
        FailureKind::Network => err.message.clone(),
        _ => err.to_string(),
    }
}
