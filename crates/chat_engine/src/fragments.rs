//! Byte stream to text fragment adapter.

use std::pin::Pin;
use std::task::{Context, Poll};

use chat_logging::chat_trace;
use futures_util::Stream;

use crate::decode::FragmentDecoder;
use crate::transport::ByteStream;
use crate::TurnError;

/// Yields non-empty decoded fragments until the body ends, then `None`.
///
/// A transport or decode error is yielded once and ends the stream.
pub struct FragmentStream {
    inner: ByteStream,
    decoder: FragmentDecoder,
    done: bool,
}

impl FragmentStream {
    pub fn new(content_type: Option<&str>, inner: ByteStream) -> Self {
        Self {
            inner,
            decoder: FragmentDecoder::for_content_type(content_type),
            done: false,
        }
    }

    pub fn encoding_name(&self) -> &'static str {
        self.decoder.encoding_name()
    }

    fn fail(&mut self, err: TurnError) -> Poll<Option<Result<String, TurnError>>> {
        self.done = true;
        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for FragmentStream {
    type Item = Result<String, TurnError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    chat_trace!("received chunk of {} bytes", bytes.len());
                    match this.decoder.decode_chunk(&bytes) {
                        // Only the start of a character so far; wait for the rest.
                        Ok(text) if text.is_empty() => continue,
                        Ok(text) => return Poll::Ready(Some(Ok(text))),
                        Err(err) => return this.fail(err.into()),
                    }
                }
                Poll::Ready(Some(Err(err))) => return this.fail(err),
                Poll::Ready(None) => {
                    this.done = true;
                    return match this.decoder.finish() {
                        Ok(tail) if tail.is_empty() => Poll::Ready(None),
                        Ok(tail) => Poll::Ready(Some(Ok(tail))),
                        Err(err) => Poll::Ready(Some(Err(err.into()))),
                    };
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
