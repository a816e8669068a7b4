//! Server-sent events decoding.
//!
//! Frames are separated by a blank line; `data:` lines are joined with `\n`,
//! `event:` names the frame and lines starting with `:` are comments (the
//! usual keep-alive). Bytes are buffered until a full line is available, so
//! chunk boundaries may fall anywhere, including inside a UTF-8 sequence.

use super::{BackendEvent, WireEvent};
use crate::error::BackendError;

/// Event names that only keep the connection alive.
const KEEPALIVE_EVENTS: [&str; 2] = ["ping", "keepalive"];

/// One dispatched SSE frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Decode the frame payload into a backend event.
    ///
    /// Returns `Ok(None)` for keep-alive frames.
    pub fn decode(&self) -> Result<Option<BackendEvent>, BackendError> {
        if self
            .event
            .as_deref()
            .is_some_and(|name| KEEPALIVE_EVENTS.contains(&name))
            || self.data.trim().is_empty()
        {
            return Ok(None);
        }
        let wire: WireEvent = serde_json::from_str(&self.data)?;
        Ok(wire.into_event())
    }
}

/// Incremental SSE frame decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Create a new empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and collect every frame they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(frame) = self.process_line(&String::from_utf8_lossy(&line)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned();
            if let Some(frame) = self.process_line(line.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // `id` and `retry` do not matter for a one-shot article stream.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}
