//! Fully buffered response returned by a transport.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::{Headers, StatusCode};

/// A response whose body has been read to completion.
///
/// # Examples
///
/// ```
/// use chatwire::http::{Headers, Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK, Headers::new(), r#"{"reply":"hello"}"#);
/// assert!(response.is_success());
///
/// let value: serde_json::Value = response.json().unwrap();
/// assert_eq!(value["reply"], "hello");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Assembles a response from its parts.
    pub fn new(status: StatusCode, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns `true` if the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as text. Invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
