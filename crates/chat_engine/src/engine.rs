use std::collections::HashMap;
use std::io;
use std::sync::{mpsc, Arc};
use std::thread;

use chat_logging::chat_debug;
use tokio_util::sync::CancellationToken;

use crate::transport::{ReqwestTransport, Transport, TransportSettings};
use crate::turn::{run_turn, ChannelProgressSink};
use crate::{EngineEvent, TurnId};

enum EngineCommand {
    Submit { turn_id: TurnId, query: String },
    Cancel { turn_id: TurnId },
}

/// Front-end handle to the background runtime that runs turns.
///
/// Dropping the handle cancels every turn still in flight.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: TransportSettings) -> io::Result<Self> {
        Self::with_transport(Arc::new(ReqwestTransport::new(settings)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> io::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let mut in_flight: HashMap<TurnId, CancellationToken> = HashMap::new();
            while let Ok(command) = cmd_rx.recv() {
                // Finished turns cancel their own token.
                in_flight.retain(|_, token| !token.is_cancelled());
                match command {
                    EngineCommand::Submit { turn_id, query } => {
                        let token = CancellationToken::new();
                        in_flight.insert(turn_id, token.clone());
                        let transport = transport.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let sink = ChannelProgressSink::new(event_tx.clone());
                            let result =
                                run_turn(transport.as_ref(), turn_id, &query, &sink, &token).await;
                            token.cancel();
                            let _ = event_tx.send(EngineEvent::TurnCompleted { turn_id, result });
                        });
                    }
                    EngineCommand::Cancel { turn_id } => {
                        if let Some(token) = in_flight.remove(&turn_id) {
                            chat_debug!("cancelling turn {}", turn_id);
                            token.cancel();
                        }
                    }
                }
            }
            for token in in_flight.values() {
                token.cancel();
            }
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn submit(&self, turn_id: TurnId, query: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Submit {
            turn_id,
            query: query.into(),
        });
    }

    pub fn cancel(&self, turn_id: TurnId) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { turn_id });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}
