use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use bytes::Bytes;
use chat_engine::{
    run_turn, ByteStream, EngineEvent, FailureKind, ProgressSink, ResponseBody, SourceEntry,
    Transport, TurnError, TurnProgress,
};
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(chat_logging::initialize_for_tests);
}

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn transcripts(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Progress(TurnProgress { transcript, .. }) => Some(transcript.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Replays fixed chunks, optionally hanging after them instead of ending.
struct ScriptedTransport {
    chunks: Vec<Result<&'static [u8], TurnError>>,
    hang_at_end: bool,
}

impl ScriptedTransport {
    fn new(chunks: Vec<Result<&'static [u8], TurnError>>) -> Self {
        Self {
            chunks,
            hang_at_end: false,
        }
    }

    fn hanging(chunks: Vec<Result<&'static [u8], TurnError>>) -> Self {
        Self {
            chunks,
            hang_at_end: true,
        }
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, _query: &str) -> Result<ResponseBody, TurnError> {
        let items: Vec<Result<Bytes, TurnError>> = self
            .chunks
            .iter()
            .cloned()
            .map(|chunk| chunk.map(Bytes::from_static))
            .collect();
        let replay = stream::iter(items);
        let stream: ByteStream = if self.hang_at_end {
            Box::pin(replay.chain(stream::pending()))
        } else {
            Box::pin(replay)
        };
        Ok(ResponseBody::new(
            Some("application/json; charset=utf-8".to_string()),
            stream,
        ))
    }
}

struct RefusingTransport;

#[async_trait::async_trait]
impl Transport for RefusingTransport {
    async fn open(&self, _query: &str) -> Result<ResponseBody, TurnError> {
        Err(TurnError::new(FailureKind::Network, "connection refused"))
    }
}

#[tokio::test]
async fn completed_turn_reports_text_and_sources() {
    init_logging();
    let transport = ScriptedTransport::new(vec![
        Ok(br#"{"text": "Hel"#.as_slice()),
        Ok(br#"lo"} {"sources": [{"doc_title":"A"},{"doc_title":"B"}]}"#.as_slice()),
    ]);
    let sink = TestSink::new();

    let outcome = run_turn(&transport, 1, "hi", &sink, &CancellationToken::new())
        .await
        .expect("turn ok");

    assert_eq!(outcome.transcript, "Hello");
    assert_eq!(
        outcome.sources,
        vec![SourceEntry::new("A"), SourceEntry::new("B")]
    );
    assert_eq!(sink.transcripts(), vec!["".to_string(), "Hello".to_string()]);
}

#[tokio::test]
async fn connection_error_mid_stream_fails_the_turn() {
    init_logging();
    let transport = ScriptedTransport::new(vec![
        Ok(br#"{"text": "Par"} "#.as_slice()),
        Err(TurnError::new(FailureKind::Network, "connection reset")),
        Ok(br#"{"text": "never"}"#.as_slice()),
    ]);
    let sink = TestSink::new();

    let err = run_turn(&transport, 3, "q", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Network);
    assert_eq!(err.to_string(), "network error: connection reset");
    // The partial transcript was already delivered and is not taken back.
    assert_eq!(sink.transcripts(), vec!["Par".to_string()]);
}

#[tokio::test]
async fn empty_reply_finishes_without_events() {
    init_logging();
    let transport = ScriptedTransport::new(Vec::new());
    let sink = TestSink::new();

    let outcome = run_turn(&transport, 5, "q", &sink, &CancellationToken::new())
        .await
        .expect("turn ok");

    assert_eq!(outcome.transcript, "");
    assert!(outcome.sources.is_empty());
    assert!(sink.transcripts().is_empty());
}

#[tokio::test]
async fn invalid_utf8_fails_with_decode_kind() {
    init_logging();
    let transport = ScriptedTransport::new(vec![
        Ok(br#"{"text": "ok"}"#.as_slice()),
        Ok(b"\xc3\x28".as_slice()),
    ]);
    let sink = TestSink::new();

    let err = run_turn(&transport, 6, "q", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Decode);
    assert_eq!(sink.transcripts(), vec!["ok".to_string()]);
}

#[tokio::test]
async fn open_failure_propagates() {
    init_logging();
    let sink = TestSink::new();
    let err = run_turn(&RefusingTransport, 7, "q", &sink, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Network);
    assert!(sink.transcripts().is_empty());
}

#[tokio::test]
async fn cancelling_aborts_a_stalled_read() {
    init_logging();
    let transport = ScriptedTransport::hanging(vec![Ok(br#"{"text": "Par"}"#.as_slice())]);
    let sink = TestSink::new();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        run_turn(&transport, 8, "q", &sink, &token),
    )
    .await
    .expect("cancellation ends the turn")
    .unwrap_err();

    assert_eq!(err.kind, FailureKind::Cancelled);
    assert_eq!(sink.transcripts(), vec!["Par".to_string()]);
}

#[tokio::test]
async fn cancelled_before_open_reads_nothing() {
    init_logging();
    let transport = ScriptedTransport::new(vec![Ok(br#"{"text": "x"}"#.as_slice())]);
    let sink = TestSink::new();
    let token = CancellationToken::new();
    token.cancel();

    let err = run_turn(&transport, 9, "q", &sink, &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Cancelled);
    assert!(sink.transcripts().is_empty());
}
