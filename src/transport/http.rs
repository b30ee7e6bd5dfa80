//! `reqwest`-backed [`Transport`].

use futures::TryStreamExt;
use tracing::debug;
use url::Url;

use super::{StreamingResponse, Transport, TransportError, TransportFuture};
use crate::config::ClientConfig;
use crate::http::{Headers, Method, Request, Response, StatusCode};

/// Executes requests with a shared [`reqwest::Client`].
///
/// Same-origin paths (`/api/chat`) are resolved against the configured proxy
/// origin; absolute URLs are used as-is.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    origin: Url,
}

impl HttpTransport {
    /// Builds a transport from the client configuration.
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidUrl`] if `proxy_origin` is not an absolute URL.
    /// - [`TransportError::Http`] if the underlying client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let origin = Url::parse(&config.proxy_origin).map_err(|source| {
            TransportError::InvalidUrl {
                url: config.proxy_origin.clone(),
                source,
            }
        })?;
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client, origin })
    }

    /// Returns the origin same-origin paths resolve against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolves a request URL to an absolute one.
    pub fn resolve(&self, raw: &str) -> Result<Url, TransportError> {
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.origin
                    .join(raw)
                    .map_err(|source| TransportError::InvalidUrl {
                        url: raw.to_owned(),
                        source,
                    })
            }
            Err(source) => Err(TransportError::InvalidUrl {
                url: raw.to_owned(),
                source,
            }),
        }
    }

    fn build(&self, request: Request) -> Result<reqwest::RequestBuilder, TransportError> {
        let (method, raw_url, headers, body) = request.into_parts();
        let url = self.resolve(&raw_url)?;
        debug!(method = %method, url = %url, "sending request");

        let mut builder = self.client.request(to_reqwest_method(method), url);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        Ok(builder)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> TransportFuture<'_, Response> {
        Box::pin(async move {
            let response = self.build(request)?.send().await?;
            let status = StatusCode::from_u16(response.status().as_u16());
            let headers = collect_headers(response.headers());
            let body = response.bytes().await?;
            debug!(status = %status, bytes = body.len(), "response received");
            Ok(Response::new(status, headers, body))
        })
    }

    fn open(&self, request: Request) -> TransportFuture<'_, StreamingResponse> {
        Box::pin(async move {
            let response = self.build(request)?.send().await?;
            let status = StatusCode::from_u16(response.status().as_u16());
            let headers = collect_headers(response.headers());
            let body = response.bytes_stream().map_err(TransportError::from);
            Ok(StreamingResponse {
                status,
                headers,
                body: Box::pin(body),
            })
        })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
    }
}

// Non-UTF-8 header values are dropped; none of the headers we read can carry them.
fn collect_headers(map: &reqwest::header::HeaderMap) -> Headers {
    let mut headers = Headers::with_capacity(map.len());
    for (name, value) in map {
        if let Ok(value) = value.to_str() {
            headers.append(name.as_str(), value);
        }
    }
    headers
}
