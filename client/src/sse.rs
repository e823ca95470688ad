//! Incremental Server-Sent-Events frame parser.
//!
//! Network chunks do not align with frame boundaries, so the parser buffers
//! partial lines and emits a [`RawFrame`] whenever a blank line completes
//! one. Field handling follows the SSE wire format: `event:` names the
//! frame, `data:` lines accumulate (joined with newlines), `id:` sets the
//! frame id, `:` lines are comments, unknown fields are ignored.

/// One parsed SSE frame, prior to payload decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawFrame {
    /// Frame name from the `event:` field; `"message"` when absent.
    pub event: String,
    /// Frame id from the `id:` field, if present.
    pub id: Option<String>,
    /// Concatenated `data:` lines.
    pub data: String,
}

/// Streaming SSE parser; feed it chunks, collect completed frames.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
    event: Option<String>,
    id: Option<String>,
    data: Vec<String>,
}

impl FrameParser {
    /// Create an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, returning every frame it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<RawFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line = self.buffer[..newline].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline);
            if let Some(frame) = self.push_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn push_line(&mut self, line: &str) -> Option<RawFrame> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            // Comment line, e.g. keep-alive padding.
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn flush(&mut self) -> Option<RawFrame> {
        if self.event.is_none() && self.id.is_none() && self.data.is_empty() {
            return None;
        }
        Some(RawFrame {
            event: self
                .event
                .take()
                .unwrap_or_else(|| "message".to_string()),
            id: self.id.take(),
            data: self.data.drain(..).collect::<Vec<_>>().join("\n"),
        })
    }
}
