//! Query parameters for `GET /api/chat/stream`.

use url::form_urlencoded;

use crate::chat::Range;

/// A streaming chat query, transported as URL query parameters.
///
/// `text` is always sent. `tz`, `date_from` and `date_to` are sent only when
/// set and non-empty, in that order.
///
/// # Examples
///
/// ```
/// use chatwire::StreamQuery;
///
/// let query = StreamQuery::new("hi").tz("UTC").date_from("");
/// assert_eq!(query.to_query_string(), "text=hi&tz=UTC");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamQuery {
    pub text: String,
    pub tz: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl StreamQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Builds a query from the same inputs [`Client::chat`](crate::Client::chat) takes.
    pub fn with_range(text: impl Into<String>, range: Option<&Range>) -> Self {
        let range = range.cloned().unwrap_or_default();
        Self {
            text: text.into(),
            tz: range.tz,
            date_from: range.date_from,
            date_to: range.date_to,
        }
    }

    #[must_use]
    pub fn tz(mut self, tz: impl Into<String>) -> Self {
        self.tz = Some(tz.into());
        self
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

    /// Encodes the query as `application/x-www-form-urlencoded`.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("text", &self.text);

        let optional = [
            ("tz", &self.tz),
            ("date_from", &self.date_from),
            ("date_to", &self.date_to),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                serializer.append_pair(key, value);
            }
        }

        serializer.finish()
    }
}
