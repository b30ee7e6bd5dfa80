//! Non-streaming chat endpoint: `POST /api/chat`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{Client, ClientError};
use crate::http::Method;
use crate::transport::Transport;

/// Path of the non-streaming chat endpoint.
pub const CHAT_PATH: &str = "/api/chat";

/// Optional date/timezone filter attached to a chat query.
///
/// Unset fields are left out of any serialized request entirely.
///
/// # Examples
///
/// ```
/// use chatwire::Range;
///
/// let range = Range::new().tz("UTC");
/// assert_eq!(serde_json::to_string(&range).unwrap(), r#"{"tz":"UTC"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
}

impl Range {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn date_from(mut self, date: impl Into<String>) -> Self {
        self.date_from = Some(date.into());
        self
    }

    #[must_use]
    pub fn date_to(mut self, date: impl Into<String>) -> Self {
        self.date_to = Some(date.into());
        self
    }

    #[must_use]
    pub fn tz(mut self, tz: impl Into<String>) -> Self {
        self.tz = Some(tz.into());
        self
    }

    /// Returns `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        self.date_from.is_none() && self.date_to.is_none() && self.tz.is_none()
    }
}

/// Body of `POST /api/chat`: the query text with the range fields flattened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    #[serde(flatten)]
    pub range: Range,
}

impl ChatRequest {
    pub fn new(text: impl Into<String>, range: Option<&Range>) -> Self {
        Self {
            text: text.into(),
            range: range.cloned().unwrap_or_default(),
        }
    }
}

/// Whatever the backend answers; passed through without a schema.
pub type ChatResponse = Value;

/// Reads the conventional `reply` string out of a chat response, if present.
///
/// ```
/// let response = serde_json::json!({ "reply": "hello" });
/// assert_eq!(chatwire::chat::reply_text(&response), Some("hello"));
/// assert_eq!(chatwire::chat::reply_text(&serde_json::json!([])), None);
/// ```
pub fn reply_text(response: &ChatResponse) -> Option<&str> {
    response.get("reply")?.as_str()
}

impl<T: Transport> Client<T> {
    /// Sends a chat query and waits for the complete answer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] with the response body text when the
    /// backend answers with a non-2xx status, or any other [`ClientError`] from
    /// the underlying [`request`](Client::request).
    pub async fn chat(
        &self,
        text: impl Into<String>,
        range: Option<&Range>,
    ) -> Result<ChatResponse, ClientError> {
        let body = ChatRequest::new(text, range);
        self.request(Method::Post, CHAT_PATH, Some(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::testing::{MockBackend, Reply};

    #[test]
    fn body_contains_only_defined_fields() {
        let body = ChatRequest::new("hi", Some(&Range::new().tz("UTC")));
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"text":"hi","tz":"UTC"}"#);
    }

    #[test]
    fn body_without_range_is_text_only() {
        let body = ChatRequest::new("hi", None);
        assert_eq!(serde_json::to_value(&body).unwrap(), json!({ "text": "hi" }));
    }

    #[test]
    fn body_with_full_range() {
        let range = Range::new()
            .date_from("2024-01-01")
            .date_to("2024-01-31")
            .tz("Asia/Singapore");
        let body = serde_json::to_value(ChatRequest::new("errors?", Some(&range))).unwrap();
        assert_eq!(
            body,
            json!({
                "text": "errors?",
                "date_from": "2024-01-01",
                "date_to": "2024-01-31",
                "tz": "Asia/Singapore"
            })
        );
    }

    #[test]
    fn range_deserializes_missing_fields() {
        let range: Range = serde_json::from_str(r#"{"date_to":"2024-02-01"}"#).unwrap();
        assert_eq!(range, Range::new().date_to("2024-02-01"));
        assert!(!range.is_empty());
        assert!(Range::new().is_empty());
    }

    #[tokio::test]
    async fn chat_posts_body_and_returns_json_unchanged() {
        let backend = MockBackend::builder()
            .route("POST", CHAT_PATH, |_, _| Reply::json(200, r#"{"reply":"hello"}"#))
            .start()
            .await;
        let client = Client::new(ClientConfig::new(backend.base_url())).unwrap();

        let response = client.chat("hi", Some(&Range::new().tz("UTC"))).await.unwrap();
        assert_eq!(response, json!({ "reply": "hello" }));
        assert_eq!(reply_text(&response), Some("hello"));

        let recorded = backend.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].method, "POST");
        assert_eq!(recorded[0].path, CHAT_PATH);
        assert_eq!(recorded[0].body_json(), json!({ "text": "hi", "tz": "UTC" }));
    }

    #[tokio::test]
    async fn chat_error_message_is_body_text() {
        let backend = MockBackend::builder()
            .route("POST", CHAT_PATH, |_, _| Reply::text(500, "boom"))
            .start()
            .await;
        let client = Client::new(ClientConfig::new(backend.base_url())).unwrap();

        let err = client.chat("hi", None).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(matches!(err, ClientError::Request { .. }));
    }

    #[tokio::test]
    async fn chat_is_not_retried() {
        let backend = MockBackend::builder()
            .route("POST", CHAT_PATH, |_, _| Reply::text(502, "upstream down"))
            .start()
            .await;
        let client = Client::new(ClientConfig::new(backend.base_url())).unwrap();

        assert!(client.chat("hi", None).await.is_err());
        assert_eq!(backend.requests().len(), 1);
    }
}
