//! Events delivered by a [`StreamHandle`](super::StreamHandle).

use std::fmt;

use thiserror::Error;

use super::decoder::{DEFAULT_EVENT_NAME, DecodeError, Message};
use crate::http::StatusCode;

/// Connection state of a stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Connecting, or waiting to reconnect after a drop.
    Connecting = 0,
    /// Connected and receiving events.
    Open = 1,
    /// Closed for good: cancelled by the caller or failed fatally.
    Closed = 2,
}

impl ReadyState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

/// A connection-level failure, delivered as an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The request or the body read failed. Recoverable: a reconnect follows.
    #[error("stream transport error: {0}")]
    Transport(String),

    /// The server closed the body. Recoverable: a reconnect follows.
    #[error("stream ended by server")]
    Disconnected,

    /// A line grew past the configured limit without a line break.
    /// Recoverable: the connection is dropped and a reconnect follows.
    #[error("stream line exceeds {0} bytes")]
    LineTooLong(usize),

    /// The server answered with something other than 200. Fatal.
    #[error("stream rejected with status {0}")]
    Status(StatusCode),

    /// The response was not `text/event-stream`. Fatal.
    #[error("unexpected stream content type {0:?}")]
    ContentType(Option<String>),

    /// The stream URL cannot be resolved. Fatal.
    #[error("invalid stream URL: {0}")]
    InvalidUrl(String),
}

impl StreamError {
    /// Returns `true` if the handle closes after this error instead of reconnecting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Status(_) | Self::ContentType(_) | Self::InvalidUrl(_)
        )
    }
}

impl From<DecodeError> for StreamError {
    fn from(error: DecodeError) -> Self {
        match error {
            DecodeError::LineTooLong { max } => Self::LineTooLong(max),
        }
    }
}

/// Everything a stream handle can deliver, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A connection (or reconnection) was established.
    Open,
    /// A server-sent event, default-named or named.
    Message(Message),
    /// A connection-level failure.
    Error(StreamError),
    /// The handle closed after a fatal error. Never delivered for caller cancellation.
    Close,
}

impl StreamEvent {
    /// Returns the name listeners subscribe with: `open`, `error`, `close`, or
    /// the message's event name.
    pub fn name(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Message(message) => &message.event,
            Self::Error(_) => "error",
            Self::Close => "close",
        }
    }
}

/// Which events a listener receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event.
    All,
    Open,
    Error,
    Close,
    /// Messages with this event name; `"message"` is the default name.
    Named(String),
}

impl EventFilter {
    /// Filter for default-named messages.
    pub fn message() -> Self {
        Self::Named(DEFAULT_EVENT_NAME.to_owned())
    }

    pub fn matches(&self, event: &StreamEvent) -> bool {
        match (self, event) {
            (Self::All, _) => true,
            (Self::Open, StreamEvent::Open) => true,
            (Self::Error, StreamEvent::Error(_)) => true,
            (Self::Close, StreamEvent::Close) => true,
            (Self::Named(name), StreamEvent::Message(message)) => message.event == *name,
            _ => false,
        }
    }
}

impl From<&str> for EventFilter {
    /// `"open"`, `"error"` and `"close"` select the lifecycle events; any other
    /// string selects messages of that name.
    fn from(name: &str) -> Self {
        match name {
            "open" => Self::Open,
            "error" => Self::Error,
            "close" => Self::Close,
            other => Self::Named(other.to_owned()),
        }
    }
}
