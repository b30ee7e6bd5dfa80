//! Streaming chat over server-sent events: `GET /api/chat/stream`.
//!
//! [`Client::stream_chat`] returns a [`StreamHandle`] right away; the
//! connection is driven by a background task that decodes the body with
//! [`SseDecoder`], delivers [`StreamEvent`]s to listeners in order, and
//! reconnects after recoverable failures until the handle is cancelled.
//!
//! ```rust,no_run
//! use chatwire::{Client, ClientConfig, StreamQuery};
//! use chatwire::stream::ChatEvent;
//!
//! # fn run() -> Result<(), chatwire::ClientError> {
//! let client = Client::new(ClientConfig::from_env())?;
//! let handle = client.stream_chat(StreamQuery::new("payments errors").tz("UTC"))?;
//! let canceller = handle.canceller();
//! handle.subscribe(chatwire::EventFilter::All, move |event| {
//!     if let chatwire::StreamEvent::Message(message) = event {
//!         match ChatEvent::from_message(message) {
//!             ChatEvent::Token(text) => print!("{text}"),
//!             event if event.is_terminal() => canceller.cancel(),
//!             _ => {}
//!         }
//!     }
//! });
//! # Ok(())
//! # }
//! ```

mod chat_event;
mod decoder;
mod event;
mod handle;
mod query;

use std::sync::Arc;

use tracing::info;

pub use self::chat_event::{ChatEvent, FetchProgress};
pub use self::decoder::{
    DEFAULT_EVENT_NAME, DEFAULT_MAX_LINE_LEN, DecodeError, Message, SseDecoder,
};
pub use self::event::{EventFilter, ReadyState, StreamError, StreamEvent};
pub use self::handle::{Canceller, EventStream, ListenerId, StreamHandle};
pub use self::query::StreamQuery;

use crate::client::{Client, ClientError};
use crate::transport::Transport;

/// Path of the streaming chat endpoint.
pub const STREAM_PATH: &str = "/api/chat/stream";

impl<T: Transport> Client<T> {
    /// Opens a streaming chat query.
    ///
    /// Returns immediately. The connection is attempted once the first
    /// listener is attached to the handle; from then on it reconnects after
    /// network failures, waiting the configured reconnect delay (or the
    /// server's `retry:` value) and resending the last event id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoRuntime`] when called outside a Tokio runtime.
    pub fn stream_chat(&self, query: StreamQuery) -> Result<StreamHandle, ClientError> {
        let url = format!(
            "{}?{}",
            self.config().endpoint(STREAM_PATH),
            query.to_query_string()
        );
        info!(url = %url, "opening chat stream");
        let handle = StreamHandle::spawn(
            url,
            Arc::clone(self.transport()),
            self.config().reconnect_delay,
            self.config().max_line_len,
        )?;
        Ok(handle)
    }
}
