//! # chatwire
//!
//! Async client for a chat backend's HTTP API: one-shot chat queries,
//! server-sent-event streaming with reconnection and cancellation, and
//! best-effort settings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatwire::{Client, ClientConfig, Range};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chatwire::ClientError> {
//!     let client = Client::new(ClientConfig::new("http://localhost:8080"))?;
//!
//!     let reply = client.chat("payments errors today", Some(&Range::new().tz("UTC"))).await?;
//!     println!("{reply}");
//!
//!     let settings = client.get_settings().await; // `{}` when unavailable
//!     println!("{settings}");
//!     Ok(())
//! }
//! ```
//!
//! Streaming is covered in [`stream`].

pub mod chat;
pub mod client;
pub mod config;
pub mod http;
pub mod settings;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod testing;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use chat::{ChatRequest, ChatResponse, Range};
pub use client::{Client, ClientError};
pub use config::ClientConfig;
pub use settings::{SettingsPayload, UiSettings};
pub use stream::{
    Canceller, ChatEvent, EventFilter, EventStream, ReadyState, StreamError, StreamEvent,
    StreamHandle, StreamQuery,
};
pub use transport::{HttpTransport, Transport, TransportError};
