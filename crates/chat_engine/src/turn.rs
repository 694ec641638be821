use chat_logging::{chat_debug, chat_info, chat_warn};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::extract::StreamExtractor;
use crate::transport::Transport;
use crate::{EngineEvent, TurnError, TurnId, TurnOutcome, TurnProgress};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Run one query to completion.
///
/// Every decoded fragment is folded into a fresh [`StreamExtractor`] before
/// the next one is requested, and a `Progress` event with the whole
/// transcript follows each fragment. Transport and decode failures end the
/// turn; transcript already emitted is left as it was.
pub async fn run_turn(
    transport: &dyn Transport,
    turn_id: TurnId,
    query: &str,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<TurnOutcome, TurnError> {
    chat_info!("turn {} started (query_len={})", turn_id, query.len());
    let result = drive(transport, turn_id, query, sink, cancel).await;
    match &result {
        Ok(outcome) => chat_info!(
            "turn {} finished: {} chars, {} sources",
            turn_id,
            outcome.transcript.chars().count(),
            outcome.sources.len()
        ),
        Err(err) => chat_warn!("turn {} failed: {}", turn_id, err),
    }
    result
}

async fn drive(
    transport: &dyn Transport,
    turn_id: TurnId,
    query: &str,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<TurnOutcome, TurnError> {
    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TurnError::cancelled()),
        body = transport.open(query) => body?,
    };

    let mut fragments = body.into_fragments();
    chat_debug!("turn {} decoding as {}", turn_id, fragments.encoding_name());
    let mut extractor = StreamExtractor::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TurnError::cancelled()),
            next = fragments.next() => next,
        };
        let Some(fragment) = next else {
            break;
        };
        let outcome = extractor.push(&fragment?);
        if outcome.sources_captured {
            chat_debug!(
                "turn {} captured {} sources",
                turn_id,
                extractor.sources().len()
            );
        }
        sink.emit(EngineEvent::Progress(TurnProgress {
            turn_id,
            transcript: extractor.transcript().to_string(),
        }));
    }

    Ok(extractor.finish())
}
