//! Server-sent events parser over a byte stream.
//!
//! Splits the upstream body into events on blank lines. Multiple `data:` lines
//! in one event are joined with `\n`. Comment lines (starting with `:`) and
//! unknown fields are ignored.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// A single server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Stream adapter that turns raw body bytes into [`SseEvent`]s.
pub struct SseEventStream<S> {
    inner: S,
    buffer: Vec<u8>,
    pending: Option<SseEvent>,
    done: bool,
}

impl<S> SseEventStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            pending: None,
            done: false,
        }
    }

    /// Consume one complete line from the buffer. Returns a finished event
    /// when the line terminates one.
    fn next_line(&mut self) -> Option<Option<SseEvent>> {
        let line_end = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=line_end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(self.apply_line(&String::from_utf8_lossy(&line)))
    }

    fn apply_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.pending.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                let event = self.pending.get_or_insert_with(SseEvent::default);
                if !event.data.is_empty() {
                    event.data.push('\n');
                }
                event.data.push_str(value);
            }
            "event" => {
                self.pending.get_or_insert_with(SseEvent::default).event = Some(value.to_string());
            }
            _ => {}
        }
        None
    }
}

impl<S, E> Stream for SseEventStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseEvent, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            while let Some(line) = self.next_line() {
                if let Some(event) = line {
                    return Poll::Ready(Some(Ok(event)));
                }
            }

            if self.done {
                // Flush an unterminated trailing line and event.
                if !self.buffer.is_empty() {
                    let rest = std::mem::take(&mut self.buffer);
                    let rest = String::from_utf8_lossy(&rest).into_owned();
                    let trimmed = rest.trim_end_matches('\r').to_string();
                    if let Some(event) = self.apply_line(&trimmed) {
                        return Poll::Ready(Some(Ok(event)));
                    }
                }
                return Poll::Ready(self.pending.take().map(Ok));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => self.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => self.done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
