//! Incremental server-sent-events decoder.
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder::feed`] buffers them in a
//! [`BytesMut`], splits complete lines (LF, CR or CRLF, even when a CRLF pair
//! straddles two chunks) and assembles them into [`Message`]s.
//!
//! | Line                 | Effect                                              |
//! |----------------------|-----------------------------------------------------|
//! | *(blank)*            | dispatch the pending event                          |
//! | `: anything`         | comment, ignored (servers use it as a keep-alive)   |
//! | `event: token`       | name of the pending event                           |
//! | `data: hello`        | append a data line                                  |
//! | `id: 17`             | set the last event id (kept across events)          |
//! | `retry: 5000`        | set the reconnection delay in milliseconds          |

use std::time::Duration;

use bytes::{Buf, BytesMut};
use thiserror::Error;

/// Name given to events that carry no `event:` field.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// Default cap on a single unterminated line (8 MiB).
pub const DEFAULT_MAX_LINE_LEN: usize = 8 * 1024 * 1024;

const BOM: char = '\u{feff}';

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Event name; `"message"` unless the server set one.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Last event id seen on this stream at dispatch time (possibly empty).
    pub last_event_id: String,
}

impl Message {
    /// Parses the data payload as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// More than `max` bytes arrived without a line break.
    #[error("line exceeds {max} bytes without a line break")]
    LineTooLong { max: usize },
}

/// Stateful decoder for a `text/event-stream` body.
///
/// # Examples
///
/// ```
/// use chatwire::stream::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.feed(b"event: token\ndata: Hel").unwrap().is_empty());
///
/// let messages = decoder.feed(b"lo\n\n").unwrap();
/// assert_eq!(messages.len(), 1);
/// assert_eq!(messages[0].event, "token");
/// assert_eq!(messages[0].data, "Hello");
/// ```
#[derive(Debug)]
pub struct SseDecoder {
    buf: BytesMut,
    // Bytes of `buf` already searched for a line break.
    scanned: usize,
    max_line_len: usize,
    data: String,
    event: String,
    last_event_id: String,
    retry: Option<Duration>,
    // A chunk ended in CR; an LF at the start of the next chunk belongs to it.
    skip_lf: bool,
    // Still at the very start of the stream, where a BOM may appear.
    at_start: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            data: String::new(),
            event: String::new(),
            last_event_id: String::new(),
            retry: None,
            skip_lf: false,
            at_start: true,
        }
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder that rejects unterminated lines longer than `max` bytes.
    pub fn with_max_line_len(max: usize) -> Self {
        Self {
            max_line_len: max,
            ..Self::default()
        }
    }

    /// Feeds a chunk of body bytes and returns every event it completed, in order.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::LineTooLong`] when the pending line outgrows the
    /// limit. Events completed earlier in the same chunk are lost; use
    /// [`feed_into`](Self::feed_into) to keep them.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Message>, DecodeError> {
        let mut messages = Vec::new();
        self.feed_into(chunk, &mut messages)?;
        Ok(messages)
    }

    /// Like [`feed`](Self::feed), but appends completed events to `out`, which
    /// keeps them even when an error follows.
    ///
    /// After an error the pending line and event are dropped; the last event id
    /// is kept.
    pub fn feed_into(&mut self, chunk: &[u8], out: &mut Vec<Message>) -> Result<(), DecodeError> {
        let mut chunk = chunk;
        if self.skip_lf && !chunk.is_empty() {
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
            self.skip_lf = false;
        }
        self.buf.extend_from_slice(chunk);

        loop {
            let Some(offset) = self.buf[self.scanned..]
                .iter()
                .position(|&b| b == b'\n' || b == b'\r')
            else {
                self.scanned = self.buf.len();
                break;
            };

            let line = self.buf.split_to(self.scanned + offset);
            self.scanned = 0;
            let terminator = self.buf[0];
            self.buf.advance(1);
            if terminator == b'\r' {
                match self.buf.first() {
                    Some(b'\n') => self.buf.advance(1),
                    Some(_) => {}
                    None => self.skip_lf = true,
                }
            }

            let mut text = String::from_utf8_lossy(&line).into_owned();
            if self.at_start {
                self.at_start = false;
                if text.starts_with(BOM) {
                    text.remove(0);
                }
            }
            if let Some(message) = self.process_line(&text) {
                out.push(message);
            }
        }

        if self.buf.len() > self.max_line_len {
            self.reset_connection();
            return Err(DecodeError::LineTooLong {
                max: self.max_line_len,
            });
        }
        Ok(())
    }

    /// Returns the last event id seen, or `""` if none.
    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Takes the reconnection delay requested by the server since the last call.
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    /// Drops any partially received event before a new connection starts.
    ///
    /// The last event id survives, so it can be sent back on reconnect.
    pub fn reset_connection(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.data.clear();
        self.event.clear();
        self.skip_lf = false;
        self.at_start = true;
    }

    fn process_line(&mut self, line: &str) -> Option<Message> {
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
            "event" => self.event = value.to_owned(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = value.to_owned();
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<Message> {
        let event = std::mem::take(&mut self.event);
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();

        Some(Message {
            event: if event.is_empty() {
                DEFAULT_EVENT_NAME.to_owned()
            } else {
                event
            },
            data,
            last_event_id: self.last_event_id.clone(),
        })
    }
}
