//! Client configuration.
//!
//! A [`ClientConfig`] is built once, handed to [`Client::new`](crate::Client::new),
//! and never mutated afterwards. Nothing in the crate reads the environment
//! on its own; [`ClientConfig::from_env`] exists for binaries that want to.

use std::time::Duration;

use crate::stream::DEFAULT_MAX_LINE_LEN;

/// Environment variable holding the backend base URL.
pub const ENV_BACKEND_BASE: &str = "CHATWIRE_BACKEND_BASE";
/// Environment variable holding the origin that same-origin paths resolve against.
pub const ENV_PROXY_ORIGIN: &str = "CHATWIRE_PROXY_ORIGIN";
/// Environment variable holding the stream reconnection delay in milliseconds.
pub const ENV_RECONNECT_MS: &str = "CHATWIRE_RECONNECT_MS";

/// Origin used for same-origin paths when no base URL is configured.
pub const DEFAULT_PROXY_ORIGIN: &str = "http://localhost:8080";

/// Reconnection delay used until the server sends a `retry:` field.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Immutable settings shared by every call a [`Client`](crate::Client) makes.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use chatwire::ClientConfig;
///
/// let config = ClientConfig::new("http://backend:8080/")
///     .with_reconnect_delay(Duration::from_millis(500));
///
/// assert_eq!(config.endpoint("/api/chat"), "http://backend:8080/api/chat");
/// assert_eq!(ClientConfig::default().endpoint("/api/chat"), "/api/chat");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Prefix for every API path. Empty means same-origin.
    pub base_url: String,
    /// Origin that same-origin paths are resolved against by the HTTP transport.
    pub proxy_origin: String,
    /// Initial wait between a dropped stream and the next connection attempt.
    pub reconnect_delay: Duration,
    /// Longest unterminated stream line accepted before the connection is dropped.
    pub max_line_len: usize,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            proxy_origin: DEFAULT_PROXY_ORIGIN.to_owned(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            user_agent: concat!("chatwire/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration targeting `base_url` with every other knob at its default.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// This is what [`from_env`](Self::from_env) delegates to; tests and
    /// embedders can supply their own source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base) = lookup(ENV_BACKEND_BASE) {
            config.base_url = base.trim().to_owned();
        }
        if let Some(origin) = lookup(ENV_PROXY_ORIGIN).filter(|v| !v.trim().is_empty()) {
            config.proxy_origin = origin.trim().to_owned();
        }
        if let Some(ms) = lookup(ENV_RECONNECT_MS).and_then(|v| v.trim().parse::<u64>().ok()) {
            config.reconnect_delay = Duration::from_millis(ms);
        }

        config
    }

    /// Sets the origin used to resolve same-origin paths.
    #[must_use]
    pub fn with_proxy_origin(mut self, origin: impl Into<String>) -> Self {
        self.proxy_origin = origin.into();
        self
    }

    /// Sets the initial stream reconnection delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the stream line-length limit.
    #[must_use]
    pub fn with_max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max;
        self
    }

    /// Sets the `User-Agent` header value.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Joins an API path onto the base URL.
    ///
    /// With an empty base the path is returned unchanged, so the request stays
    /// same-origin. A trailing `/` on the base is not doubled.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.is_empty() {
            return path.to_owned();
        }
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}
