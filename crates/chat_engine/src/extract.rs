//! Pattern-based extraction of reply text and cited sources.
//!
//! The reply body is a run of JSON fragments that only becomes well formed
//! once the response is complete, so instead of a JSON parser the extractor
//! keeps an accumulation buffer and repeatedly pulls two things out of it:
//!
//! - every complete `"text": "<escaped string>"` field, appended to the
//!   transcript in stream order and then cut from the buffer;
//! - the `"sources": [ ... ]` block, once it parses, captured exactly once.
//!
//! Whatever neither pattern consumes stays in the buffer and is ignored.
//!
//! ## Known fragility
//! The sources block is assumed to end at the *last* `]` in the buffer. Any
//! bracketed content streamed after the sources array keeps the block from
//! parsing, and the reply then finishes without sources. A `"text"` field
//! inside a source entry is treated as reply text, and cutting it out leaves
//! a dangling comma (`{"doc_title":"A",}`), so that block never parses and
//! its sources are lost as well.

use std::borrow::Cow;
use std::str::Chars;
use std::sync::LazyLock;

use chat_logging::{chat_debug, chat_trace};
use regex::Regex;
use serde::Deserialize;

use crate::{SourceEntry, TurnOutcome};

/// A quoted value ends at the first quote not preceded by an odd number of
/// backslashes; `\\.` consumes each escape pair whole.
static TEXT_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"text"\s*:\s*"([^"\\]*(?:\\.[^"\\]*)*)""#).expect("text field pattern")
});

const SOURCES_MARKER: &str = r#""sources": ["#;

#[derive(Debug, Deserialize)]
struct SourcesBlock {
    sources: Vec<SourceDoc>,
}

#[derive(Debug, Deserialize)]
struct SourceDoc {
    #[serde(default)]
    doc_title: Option<serde_json::Value>,
}

/// What a single fragment changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FragmentOutcome {
    /// At least one complete text field was consumed.
    pub text_appended: bool,
    /// The sources block was captured by this fragment. True at most once
    /// per extractor.
    pub sources_captured: bool,
}

/// Per-turn extraction state. Create one per reply and drop it afterwards.
#[derive(Debug, Default)]
pub struct StreamExtractor {
    buffer: String,
    transcript: String,
    sources: Vec<SourceEntry>,
    sources_captured: bool,
}

impl StreamExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decoded fragment into the buffer and extract what completed.
    pub fn push(&mut self, fragment: &str) -> FragmentOutcome {
        self.buffer.push_str(fragment);
        let text_appended = self.take_text_fields();
        let sources_captured = !self.sources_captured && self.try_capture_sources();
        FragmentOutcome {
            text_appended,
            sources_captured,
        }
    }

    /// Everything extracted so far. Only ever grows.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn sources(&self) -> &[SourceEntry] {
        &self.sources
    }

    pub fn sources_captured(&self) -> bool {
        self.sources_captured
    }

    /// Received text not yet consumed by either pattern.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn finish(self) -> TurnOutcome {
        if !self.buffer.trim().is_empty() {
            chat_trace!("discarding {} unconsumed bytes at end of reply", self.buffer.len());
        }
        TurnOutcome {
            transcript: self.transcript,
            sources: self.sources,
        }
    }

    fn take_text_fields(&mut self) -> bool {
        let mut residual = String::new();
        let mut last_end = 0;
        let mut matched = false;

        for caps in TEXT_FIELD.captures_iter(&self.buffer) {
            let (Some(field), Some(value)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            residual.push_str(&self.buffer[last_end..field.start()]);
            last_end = field.end();
            self.transcript.push_str(&unescape_text(value.as_str()));
            matched = true;
        }

        if matched {
            residual.push_str(&self.buffer[last_end..]);
            self.buffer = residual;
        }
        matched
    }

    fn try_capture_sources(&mut self) -> bool {
        let Some(start) = self.buffer.find(SOURCES_MARKER) else {
            return false;
        };
        let Some(end) = self.buffer.rfind(']') else {
            return false;
        };
        if end <= start {
            return false;
        }

        let wrapped = format!("{{{}}}", &self.buffer[start..=end]);
        match serde_json::from_str::<SourcesBlock>(&wrapped) {
            Ok(block) => {
                self.sources = block
                    .sources
                    .into_iter()
                    .filter_map(|doc| match doc.doc_title {
                        Some(serde_json::Value::String(title)) => Some(SourceEntry::new(title)),
                        _ => None,
                    })
                    .collect();
                self.sources_captured = true;
                self.buffer.replace_range(start..=end, "");
                chat_debug!("captured {} sources", self.sources.len());
                true
            }
            Err(err) => {
                // Usually the block is still growing; retried on the next fragment.
                chat_debug!("sources block not parseable yet: {}", err);
                false
            }
        }
    }
}

/// Resolve the JSON escapes of a quoted value (without its quotes).
///
/// Unknown or truncated escapes are kept verbatim.
pub fn unescape_text(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => match unicode_escape(&mut chars) {
                Some(decoded) => out.push(decoded),
                None => out.push_str("\\u"),
            },
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

/// Decode the `XXXX` after `\u`, joining surrogate pairs. Leaves `chars`
/// untouched when the escape is invalid.
fn unicode_escape(chars: &mut Chars<'_>) -> Option<char> {
    let mut lookahead = chars.clone();
    let first = read_hex4(&mut lookahead)?;
    let code = if (0xD800..0xDC00).contains(&first) {
        let mut pair = lookahead.clone();
        if pair.next() != Some('\\') || pair.next() != Some('u') {
            return None;
        }
        let second = read_hex4(&mut pair)?;
        if !(0xDC00..0xE000).contains(&second) {
            return None;
        }
        lookahead = pair;
        0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00)
    } else {
        first
    };
    let decoded = char::from_u32(code)?;
    *chars = lookahead;
    Some(decoded)
}

fn read_hex4(chars: &mut Chars<'_>) -> Option<u32> {
    let mut value = 0;
    for _ in 0..4 {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}
