//! Server-sent events framing for the Mastodon streaming API.
//!
//! The server sends `event:` / `data:` field lines, separated into frames by
//! a blank line. Lines starting with `:` are heartbeats; they are surfaced so
//! the consumer can tell a quiet stream from a dead one.

use tracing::{debug, warn};

use super::{Notification, Status, StreamEvent};

/// One unit of parser output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A `:` comment line
    Heartbeat,
    /// A dispatched event
    Event { event: Option<String>, data: String },
}

/// Incremental parser fed with raw body chunks.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event_type: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
            } else if line.starts_with(':') {
                debug!("Received heartbeat");
                frames.push(SseFrame::Heartbeat);
            } else {
                self.process_field(&line);
            }
        }

        frames
    }

    fn process_field(&mut self, line: &str) {
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event_type.take();
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(SseFrame::Event { event, data })
    }
}

/// Turn a frame into a typed event.
///
/// Payloads that fail to decode are logged and dropped.
pub fn decode_frame(frame: &SseFrame) -> Option<StreamEvent> {
    let (event, data) = match frame {
        SseFrame::Heartbeat => return Some(StreamEvent::Heartbeat),
        SseFrame::Event { event, data } => (event, data),
    };
    match event.as_deref().unwrap_or("message") {
        "update" => match serde_json::from_str::<Status>(data) {
            Ok(status) => Some(StreamEvent::Update(status)),
            Err(e) => {
                warn!("Dropping malformed update event: {}", e);
                None
            }
        },
        "notification" => match serde_json::from_str::<Notification>(data) {
            Ok(notification) => Some(StreamEvent::Notification(notification)),
            Err(e) => {
                warn!("Dropping malformed notification event: {}", e);
                None
            }
        },
        "delete" => Some(StreamEvent::Delete(data.clone())),
        "error" => Some(StreamEvent::Error(data.clone())),
        other => Some(StreamEvent::Other(other.to_string())),
    }
}
