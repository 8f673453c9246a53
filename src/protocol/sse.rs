//! Incremental decoder for `text/event-stream` bodies

use crate::error::ApiError;
use crate::protocol::envelope::ServerEvent;

/// Splits a byte stream into event payloads.
///
/// Chunks may end anywhere, including inside a UTF-8 sequence; incomplete
/// lines stay buffered until the rest arrives. Only `data` fields are kept.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the data of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if line.starts_with(':') {
                // comment / keep-alive
            } else if let Some(value) = line.strip_prefix("data") {
                match value.strip_prefix(':') {
                    Some(value) => self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string()),
                    None if value.is_empty() => self.data.push(String::new()),
                    None => {}
                }
            }
        }
        events
    }
}

/// Parse one event payload.
pub fn decode_event(data: &str) -> Result<ServerEvent, ApiError> {
    Ok(serde_json::from_str(data)?)
}
