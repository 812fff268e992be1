//! Frame decoder for the SSE-style message stream.
//!
//! Network reads do not align with message boundaries, so the decoder owns
//! the partial-buffer problem: it accumulates chunks and emits a record for
//! every complete message, however the chunks were split.

use crate::event::StreamEvent;

/// Message separator on the wire: one blank line between frames.
const FRAME_SEPARATOR: &str = "\n\n";

/// Decoder that turns raw text chunks into complete [`StreamEvent`] records.
///
/// Handles:
/// - Chunk boundaries splitting a message anywhere, including mid-field
/// - Multiple complete messages arriving in one chunk
/// - Malformed payloads (dropped, decoding resumes with the next message)
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    /// Create a new decoder with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes and return any complete records, in order.
    ///
    /// Every segment before a blank-line separator is a complete message;
    /// whatever follows the last separator stays buffered for the next call.
    /// A message whose payload fails to decode is skipped without affecting
    /// the buffer or subsequent messages.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find(FRAME_SEPARATOR) {
            let message: String = self.buffer.drain(..pos + FRAME_SEPARATOR.len()).collect();
            if let Some(event) = decode_message(message.trim_end_matches(FRAME_SEPARATOR)) {
                events.push(event);
            }
        }
        events
    }

    /// Bytes currently buffered awaiting a separator.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Decode one complete message: find the data-bearing line and parse its
/// payload. Returns `None` for comment-only, empty, or malformed messages.
fn decode_message(message: &str) -> Option<StreamEvent> {
    for line in message.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            let payload = rest.strip_prefix(' ').unwrap_or(rest);
            match serde_json::from_str::<StreamEvent>(payload) {
                Ok(event) => return Some(event),
                Err(e) => {
                    tracing::warn!("Failed to parse stream event: {e}");
                    return None;
                }
            }
        }
    }
    None
}
