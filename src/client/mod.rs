//! The API client and its request primitive.
//!
//! [`Client`] owns the immutable [`ClientConfig`] and a [`Transport`]. Endpoint
//! methods live next to their data types: [`chat`](crate::chat),
//! [`stream`](crate::stream) and [`settings`](crate::settings) each add an
//! `impl` block to `Client`.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;
use crate::http::{Method, Request, StatusCode};
use crate::transport::{HttpTransport, Transport, TransportError};

/// Errors returned by the request/response endpoints.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered with a non-2xx status. Displays as the raw body text.
    #[error("{body}")]
    Request { status: StatusCode, body: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("streaming requires a running Tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

impl ClientError {
    /// Returns the HTTP status for [`ClientError::Request`], `None` otherwise.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Client for the chat backend.
///
/// Cloning is cheap: the configuration and transport are shared.
///
/// # Examples
///
/// ```rust,no_run
/// use chatwire::{Client, ClientConfig, Range};
///
/// # async fn run() -> Result<(), chatwire::ClientError> {
/// let client = Client::new(ClientConfig::new("http://localhost:8080"))?;
/// let reply = client.chat("payments errors today", Some(&Range::new().tz("UTC"))).await?;
/// println!("{reply}");
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport = HttpTransport> {
    config: Arc<ClientConfig>,
    transport: Arc<T>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl Client<HttpTransport> {
    /// Creates a client backed by [`HttpTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the transport cannot be built from `config`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client over a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Performs one request against `path` and decodes the JSON response.
    ///
    /// `path` is joined onto the configured base URL. When `body` is given it
    /// is sent as JSON. No retries are attempted.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Request`] for a non-2xx status, carrying the body text.
    /// - [`ClientError::Transport`] if the request could not be completed.
    /// - [`ClientError::Encode`] / [`ClientError::Decode`] for JSON failures.
    pub async fn request<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        let mut request = Request::new(method, url).header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body).map_err(ClientError::Encode)?;
        }

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            debug!(path, status = %response.status(), "backend rejected request");
            return Err(ClientError::Request {
                status: response.status(),
                body: response.text(),
            });
        }

        response.json().map_err(ClientError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::testing::{MockBackend, Reply};

    fn client_for(backend: &MockBackend) -> Client {
        Client::new(ClientConfig::new(backend.base_url())).unwrap()
    }

    #[tokio::test]
    async fn non_success_carries_body_text() {
        let backend = MockBackend::builder()
            .route("GET", "/api/thing", |_, _| Reply::text(503, "try later"))
            .start()
            .await;
        let client = client_for(&backend);

        let err = client
            .request::<(), Value>(Method::Get, "/api/thing", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "try later");
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn success_decodes_json() {
        let backend = MockBackend::builder()
            .route("POST", "/api/thing", |req, _| Reply::json(200, req.body_text()))
            .start()
            .await;
        let client = client_for(&backend);

        let value: Value = client
            .request(Method::Post, "/api/thing", Some(&json!({ "k": [1, 2] })))
            .await
            .unwrap();
        assert_eq!(value, json!({ "k": [1, 2] }));
        assert_eq!(backend.requests()[0].header("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn invalid_json_is_decode_error() {
        let backend = MockBackend::builder()
            .route("GET", "/api/thing", |_, _| Reply::text(200, "not json"))
            .start()
            .await;
        let client = client_for(&backend);

        let err = client
            .request::<(), Value>(Method::Get, "/api/thing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let addr = MockBackend::unused_addr().await;
        let client = Client::new(ClientConfig::new(format!("http://{addr}"))).unwrap();

        let err = client
            .request::<(), Value>(Method::Get, "/api/thing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn empty_base_goes_through_proxy_origin() {
        let backend = MockBackend::builder()
            .route("GET", "/api/thing", |_, _| Reply::json(200, "{\"ok\":true}"))
            .start()
            .await;
        let config = ClientConfig::default().with_proxy_origin(backend.base_url());
        let client = Client::new(config).unwrap();

        let value: Value = client
            .request::<(), _>(Method::Get, "/api/thing", None)
            .await
            .unwrap();
        assert_eq!(value, json!({ "ok": true }));
    }
}
