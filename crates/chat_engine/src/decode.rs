use encoding_rs::{Decoder, DecoderResult, Encoding, UTF_8};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed {encoding} sequence near byte {offset}")]
    Malformed { encoding: String, offset: u64 },
    #[error("{encoding} decoder used after end of stream")]
    Finished { encoding: String },
    #[error("chunk of {len} bytes is too large to decode")]
    ChunkTooLarge { len: usize },
}

/// Incremental byte-to-text decoder for a response body.
///
/// Bytes that end in the middle of a character are held back and completed
/// by the next chunk, so chunk boundaries never corrupt a code point.
/// Unlike a lossy decoder, malformed input is reported instead of replaced.
pub struct FragmentDecoder {
    decoder: Decoder,
    consumed: u64,
    finished: bool,
}

impl FragmentDecoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            decoder: encoding.new_decoder(),
            consumed: 0,
            finished: false,
        }
    }

    /// Content-Type charset -> UTF-8 fallback. A BOM still wins over both.
    pub fn for_content_type(content_type: Option<&str>) -> Self {
        let encoding = content_type
            .and_then(extract_charset)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        Self::new(encoding)
    }

    pub fn encoding_name(&self) -> &'static str {
        self.decoder.encoding().name()
    }

    /// Decode one raw chunk. The result may be empty when the chunk only
    /// carried the start of a multi-byte character.
    pub fn decode_chunk(&mut self, bytes: &[u8]) -> Result<String, DecodeError> {
        self.decode(bytes, false)
    }

    /// Flush at end of stream. A character left incomplete is an error.
    pub fn finish(&mut self) -> Result<String, DecodeError> {
        let tail = self.decode(&[], true)?;
        self.finished = true;
        Ok(tail)
    }

    fn decode(&mut self, bytes: &[u8], last: bool) -> Result<String, DecodeError> {
        if self.finished {
            return Err(DecodeError::Finished {
                encoding: self.encoding_name().to_string(),
            });
        }
        let capacity = self
            .decoder
            .max_utf8_buffer_length_without_replacement(bytes.len())
            .ok_or(DecodeError::ChunkTooLarge { len: bytes.len() })?;
        let mut text = String::with_capacity(capacity);
        let (result, read) = self
            .decoder
            .decode_to_string_without_replacement(bytes, &mut text, last);
        let offset = self.consumed + read as u64;
        self.consumed += bytes.len() as u64;
        match result {
            DecoderResult::InputEmpty => Ok(text),
            DecoderResult::Malformed(_, _) => {
                self.finished = true;
                Err(DecodeError::Malformed {
                    encoding: self.encoding_name().to_string(),
                    offset,
                })
            }
            // Capacity above is the decoder's own worst case.
            DecoderResult::OutputFull => Err(DecodeError::ChunkTooLarge { len: bytes.len() }),
        }
    }
}

pub(crate) fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("charset") {
                return None;
            }
            Some(value.trim_matches([' ', '"', '\''].as_ref()))
        })
        .find(|label| !label.is_empty())
        .map(|s| s.to_string())
}
