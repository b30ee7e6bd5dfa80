//! Best-effort settings endpoints: `GET` and `POST /api/settings`.
//!
//! The backend may not implement settings at all, so [`Client::get_settings`]
//! and [`Client::save_settings`] never fail: any problem collapses to an empty
//! JSON object. Use the `try_` variants to tell "unavailable" from "empty".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::{Client, ClientError};
use crate::http::Method;
use crate::transport::Transport;

/// Path of the settings endpoints.
pub const SETTINGS_PATH: &str = "/api/settings";

/// Settings as the backend sends them; no schema is enforced.
pub type SettingsPayload = Value;

fn empty() -> SettingsPayload {
    Value::Object(Map::new())
}

/// The settings shape the chat backend currently serves.
///
/// Purely a convenience: the endpoints themselves work on [`SettingsPayload`].
///
/// ```
/// use chatwire::settings::UiSettings;
///
/// let payload = serde_json::json!({
///     "model": "gpt-4o",
///     "temperature": 0.5,
///     "top_p": 1.0,
///     "system_prompt": "be brief",
///     "streaming": false
/// });
/// let settings = UiSettings::from_payload(&payload).unwrap();
/// assert_eq!(settings.model, "gpt-4o");
/// assert!(!settings.streaming);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub system_prompt: String,
    pub streaming: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.2,
            top_p: 0.9,
            system_prompt: "You are an MCP intent router...".to_owned(),
            streaming: true,
        }
    }
}

impl UiSettings {
    /// Reads the typed view out of a raw payload.
    pub fn from_payload(payload: &SettingsPayload) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }

    pub fn to_payload(&self) -> SettingsPayload {
        // Only plain fields; serializing to a Value cannot fail.
        serde_json::to_value(self).unwrap_or_else(|_| empty())
    }
}

impl<T: Transport> Client<T> {
    /// Fetches the settings, or `{}` if they cannot be fetched.
    pub async fn get_settings(&self) -> SettingsPayload {
        self.try_get_settings().await.unwrap_or_else(|e| {
            debug!(error = %e, "settings fetch failed; using empty settings");
            empty()
        })
    }

    /// Saves `payload` and returns what the backend echoed, or `{}` on any failure.
    pub async fn save_settings<B>(&self, payload: &B) -> SettingsPayload
    where
        B: Serialize + ?Sized,
    {
        self.try_save_settings(payload).await.unwrap_or_else(|e| {
            debug!(error = %e, "settings save failed; using empty settings");
            empty()
        })
    }

    /// Fetches the settings.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn try_get_settings(&self) -> Result<SettingsPayload, ClientError> {
        self.request::<(), _>(Method::Get, SETTINGS_PATH, None).await
    }

    /// Saves `payload` and returns the backend's answer.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn try_save_settings<B>(&self, payload: &B) -> Result<SettingsPayload, ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.request(Method::Post, SETTINGS_PATH, Some(payload)).await
    }
}
