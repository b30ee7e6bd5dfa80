//! Outgoing request description handed to a transport.

use bytes::Bytes;
use serde::Serialize;

use super::{Headers, Method};

/// A request ready to be executed by a [`Transport`](crate::transport::Transport).
///
/// `url` is either absolute (`http://host:port/api/chat`) or a same-origin path
/// (`/api/chat`); resolving the latter is the transport's job.
///
/// # Examples
///
/// ```
/// use chatwire::http::{Method, Request};
///
/// let request = Request::new(Method::Post, "/api/chat")
///     .json(&serde_json::json!({ "text": "hi" }))
///     .unwrap();
///
/// assert_eq!(request.method(), Method::Post);
/// assert_eq!(request.url(), "/api/chat");
/// assert_eq!(request.headers().get("content-type"), Some("application/json"));
/// assert_eq!(request.body().map(|b| &b[..]), Some(&br#"{"text":"hi"}"#[..]));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: Headers,
    body: Option<Bytes>,
}

impl Request {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    /// Shorthand for `Request::new(Method::Get, url)`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Shorthand for `Request::new(Method::Post, url)`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Sets a header, replacing any previous value with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.headers.set("Content-Type", "application/json");
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the target URL or same-origin path.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body, if one was set.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Splits the request into its parts, for transports that rebuild it.
    pub fn into_parts(self) -> (Method, String, Headers, Option<Bytes>) {
        (self.method, self.url, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_has_no_body() {
        let req = Request::get("/api/settings");
        assert_eq!(req.method(), Method::Get);
        assert!(req.body().is_none());
        assert!(req.headers().is_empty());
    }

    #[test]
    fn header_replaces() {
        let req = Request::get("/x")
            .header("Accept", "application/json")
            .header("accept", "text/event-stream");
        let all: Vec<_> = req.headers().get_all("accept").collect();
        assert_eq!(all, vec!["text/event-stream"]);
    }

    #[test]
    fn json_body_and_content_type() {
        let req = Request::post("/api/settings")
            .json(&serde_json::json!({ "a": 1 }))
            .unwrap();
        assert_eq!(req.headers().get("Content-Type"), Some("application/json"));
        assert_eq!(req.body().unwrap().as_ref(), br#"{"a":1}"#);
    }

    #[test]
    fn into_parts_round_trip() {
        let (method, url, headers, body) = Request::post("/p").header("X-Id", "7").into_parts();
        assert_eq!(method, Method::Post);
        assert_eq!(url, "/p");
        assert_eq!(headers.get("x-id"), Some("7"));
        assert!(body.is_none());
    }
}
