//! Request executors.
//!
//! The clients never talk to the network directly. They hand a [`Request`] to a
//! [`Transport`], which either buffers the whole response ([`Transport::send`])
//! or returns the response head plus a live body stream ([`Transport::open`]).
//! [`HttpTransport`] is the `reqwest`-backed implementation.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

use crate::http::{Headers, Request, Response, StatusCode};

pub mod http;

pub use self::http::HttpTransport;

/// Errors produced while executing a request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Body of a streaming response, yielded chunk by chunk as it arrives.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// A response whose head has arrived but whose body is still being received.
pub struct StreamingResponse {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: ByteStream,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes requests against a backend.
///
/// Implementations perform exactly one attempt per call; retrying is the
/// caller's business.
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` and buffers the complete response body.
    fn send(&self, request: Request) -> TransportFuture<'_, Response>;

    /// Sends `request` and resolves as soon as the response head is available.
    fn open(&self, request: Request) -> TransportFuture<'_, StreamingResponse>;
}
