//! Typed view of the events the chat backend emits on `/api/chat/stream`.
//!
//! A typical answer arrives as:
//!
//! ```text
//! received → llm_start("plan") → route_planned → fetch_progress* → joined
//!          → llm_start("answer") → token* → done
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::decoder::Message;

/// Progress of one backend data fetch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchProgress {
    pub endpoint: String,
    /// `"start"`, `"ok"` or `"error"`.
    pub status: String,
}

/// A decoded chat stream event.
///
/// Unknown event names, and known names whose payload fails to decode, are
/// kept as [`ChatEvent::Other`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// The backend accepted the query; carries the query text back.
    Received(String),
    /// A model call started; the payload names the phase (`plan`, `answer`).
    LlmStart(String),
    /// The routing plan, as JSON.
    RoutePlanned(Value),
    FetchProgress(FetchProgress),
    /// The combined fetch results, as JSON.
    Joined(Value),
    /// A fragment of the answer text.
    Token(String),
    /// The answer is complete.
    Done,
    Other(Message),
}

impl ChatEvent {
    /// Decodes a stream message.
    ///
    /// ```
    /// use chatwire::stream::{ChatEvent, Message};
    ///
    /// let message = Message {
    ///     event: "token".into(),
    ///     data: "Hel".into(),
    ///     last_event_id: String::new(),
    /// };
    /// assert_eq!(ChatEvent::from_message(&message), ChatEvent::Token("Hel".into()));
    /// ```
    pub fn from_message(message: &Message) -> Self {
        let decoded = match message.event.as_str() {
            "received" => Some(Self::Received(message.data.clone())),
            "llm_start" => Some(Self::LlmStart(message.data.clone())),
            "route_planned" => message.json().ok().map(Self::RoutePlanned),
            "fetch_progress" => message.json().ok().map(Self::FetchProgress),
            "joined" => message.json().ok().map(Self::Joined),
            "token" => Some(Self::Token(message.data.clone())),
            "done" => Some(Self::Done),
            _ => None,
        };
        decoded.unwrap_or_else(|| Self::Other(message.clone()))
    }

    /// Returns `true` for the event that ends an answer.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl From<&Message> for ChatEvent {
    fn from(message: &Message) -> Self {
        Self::from_message(message)
    }
}
