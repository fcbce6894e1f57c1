//! Length-prefixed frame format for streamed completions.
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes of
//! UTF-8 JSON:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────┐
//! │ u32 len (BE) │ {"type":"chunk","chunk":{"choices":...}} │
//! └──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! A well-formed stream is zero or more `chunk` frames followed by exactly one
//! `finish`, optionally preceded by a single `error`.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::CompletionChunk;
use crate::sse_parser::{SseEvent, SseEventStream};

/// A provider-agnostic stream of frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = StreamFrame> + Send>>;

/// One unit of the normalized streaming wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    Chunk { chunk: CompletionChunk },
    Error { error: String },
    Finish,
}

impl StreamFrame {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Encode as length prefix plus JSON body.
    pub fn encode(&self) -> Bytes {
        let json = serde_json::to_vec(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize frame");
            br#"{"type":"error","error":"frame serialization failed"}"#.to_vec()
        });
        let mut buf = BytesMut::with_capacity(4 + json.len());
        buf.put_u32(json.len() as u32);
        buf.put_slice(&json);
        buf.freeze()
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish)
    }
}

/// Errors when decoding a frame buffer.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("invalid frame json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a complete buffer of concatenated frames.
pub fn decode_frames(mut buf: &[u8]) -> Result<Vec<StreamFrame>, FrameError> {
    let mut frames = Vec::new();
    while buf.has_remaining() {
        if buf.remaining() < 4 {
            return Err(FrameError::Truncated {
                needed: 4,
                available: buf.remaining(),
            });
        }
        let len = buf.get_u32() as usize;
        if buf.remaining() < len {
            return Err(FrameError::Truncated {
                needed: len,
                available: buf.remaining(),
            });
        }
        frames.push(serde_json::from_slice(&buf[..len])?);
        buf.advance(len);
    }
    Ok(frames)
}

// ============================================================================
// Stream constructors
// ============================================================================

/// A stream replaying a fixed list of frames.
pub fn from_frames(frames: Vec<StreamFrame>) -> FrameStream {
    Box::pin(futures::stream::iter(frames))
}

/// `[error(message), finish]`.
pub fn error_then_finish(message: impl Into<String>) -> FrameStream {
    from_frames(vec![StreamFrame::error(message), StreamFrame::Finish])
}

/// End the stream with `error` + `finish` when the inner stream stalls.
pub fn with_idle_timeout(inner: FrameStream, idle: Duration) -> FrameStream {
    Box::pin(IdleTimeoutStream {
        inner: Box::pin(tokio_stream::StreamExt::timeout(inner, idle)),
        pending_finish: false,
        finished: false,
    })
}

type TimedFrames =
    Pin<Box<dyn Stream<Item = Result<StreamFrame, tokio_stream::Elapsed>> + Send>>;

struct IdleTimeoutStream {
    inner: TimedFrames,
    pending_finish: bool,
    finished: bool,
}

impl Stream for IdleTimeoutStream {
    type Item = StreamFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if self.pending_finish {
            self.finished = true;
            return Poll::Ready(Some(StreamFrame::Finish));
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if frame.is_finish() {
                    self.finished = true;
                }
                Poll::Ready(Some(frame))
            }
            Poll::Ready(Some(Err(_elapsed))) => {
                tracing::warn!("upstream stream idle timeout");
                self.pending_finish = true;
                Poll::Ready(Some(StreamFrame::error("stream idle timeout")))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

// ============================================================================
// SSE to frames
// ============================================================================

/// Outcome of decoding one upstream SSE event.
pub(crate) enum SseDecoded {
    Chunk(CompletionChunk),
    /// Upstream reported an error in-band.
    Error(String),
    /// Upstream signalled the end of the stream.
    Done,
    Skip,
}

/// Maps a provider's SSE events to frames with a per-provider decoder.
///
/// The decoder may carry state across events. Transport errors mid-stream
/// become `error` + `finish`. The stream always ends with exactly one
/// `finish`.
pub(crate) struct SseFrameStream<S, D> {
    inner: SseEventStream<S>,
    decode: D,
    pending_finish: bool,
    finished: bool,
}

impl<S, D> SseFrameStream<S, D>
where
    D: FnMut(&SseEvent) -> SseDecoded,
{
    pub(crate) fn new(inner: S, decode: D) -> Self {
        Self {
            inner: SseEventStream::new(inner),
            decode,
            pending_finish: false,
            finished: false,
        }
    }
}

impl<S, D, E> Stream for SseFrameStream<S, D>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    D: FnMut(&SseEvent) -> SseDecoded + Unpin,
    E: std::fmt::Display,
{
    type Item = StreamFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        if this.pending_finish {
            this.finished = true;
            return Poll::Ready(Some(StreamFrame::Finish));
        }

        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if event.data.is_empty() {
                        continue;
                    }
                    match (this.decode)(&event) {
                        SseDecoded::Chunk(chunk) => {
                            return Poll::Ready(Some(StreamFrame::Chunk { chunk }));
                        }
                        SseDecoded::Error(message) => {
                            this.pending_finish = true;
                            return Poll::Ready(Some(StreamFrame::error(message)));
                        }
                        SseDecoded::Done => {
                            this.finished = true;
                            return Poll::Ready(Some(StreamFrame::Finish));
                        }
                        SseDecoded::Skip => continue,
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    this.pending_finish = true;
                    return Poll::Ready(Some(StreamFrame::error(format!(
                        "upstream stream failed: {e}"
                    ))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    return Poll::Ready(Some(StreamFrame::Finish));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
