//! Chat engine: reply transport, incremental decoding and extraction.
mod decode;
mod engine;
mod extract;
mod fragments;
mod transport;
mod turn;
mod types;

pub use decode::{DecodeError, FragmentDecoder};
pub use engine::EngineHandle;
pub use extract::{unescape_text, FragmentOutcome, StreamExtractor};
pub use fragments::FragmentStream;
pub use transport::{ByteStream, ReqwestTransport, ResponseBody, Transport, TransportSettings};
pub use turn::{run_turn, ChannelProgressSink, ProgressSink};
pub use types::{
    EngineEvent, FailureKind, SourceEntry, TurnError, TurnId, TurnOutcome, TurnProgress,
};
