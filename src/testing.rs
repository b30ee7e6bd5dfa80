//! In-process HTTP/1.1 backend for tests.
//!
//! Accepts TCP connections with Tokio, parses each request with [`httparse`],
//! records it, and answers with a scripted [`Reply`]. Every response carries
//! `Connection: close`; streaming replies end by closing the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::http::{Headers, StatusCode};

const MAX_HEADERS: usize = 64;

type Handler = Arc<dyn Fn(&RecordedRequest, usize) -> Reply + Send + Sync + 'static>;

/// A request as the backend received it.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    headers: Headers,
    body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }

    /// Decoded query parameters, in order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let query = self.query.as_deref().unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    /// Parses a complete request head plus body out of `buf`.
    ///
    /// Returns `None` until enough bytes have arrived.
    fn parse(buf: &[u8]) -> Option<Result<Self, httparse::Error>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut raw = httparse::Request::new(&mut headers);
        let body_offset = match raw.parse(buf) {
            Ok(httparse::Status::Complete(offset)) => offset,
            Ok(httparse::Status::Partial) => return None,
            Err(e) => return Some(Err(e)),
        };

        let headers: Headers = raw
            .headers
            .iter()
            .map(|h| (h.name, String::from_utf8_lossy(h.value).into_owned()))
            .collect();
        let content_length = headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() < body_offset + content_length {
            return None;
        }

        let target = raw.path.unwrap_or("/");
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };

        Some(Ok(Self {
            method: raw.method.unwrap_or_default().to_owned(),
            path,
            query,
            headers,
            body: Bytes::copy_from_slice(&buf[body_offset..body_offset + content_length]),
        }))
    }
}

#[derive(Debug, Clone)]
enum Frame {
    Bytes(String),
    Pause(Duration),
}

/// Scripted response for one request.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    status: StatusCode,
    content_type: String,
    frames: Vec<Frame>,
    streaming: bool,
    hold: bool,
}

impl Reply {
    /// A complete `application/json` response.
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::buffered(status, "application/json", body.into())
    }

    /// A complete `text/plain` response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::buffered(status, "text/plain; charset=utf-8", body.into())
    }

    /// A 200 `text/event-stream` response; add frames with [`send`](Self::send).
    pub fn sse() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "text/event-stream".to_owned(),
            frames: Vec::new(),
            streaming: true,
            hold: false,
        }
    }

    fn buffered(status: u16, content_type: &str, body: String) -> Self {
        Self {
            status: StatusCode::from_u16(status),
            content_type: content_type.to_owned(),
            frames: vec![Frame::Bytes(body)],
            streaming: false,
            hold: false,
        }
    }

    /// Writes `raw` to the socket and flushes.
    pub fn send(mut self, raw: impl Into<String>) -> Self {
        self.frames.push(Frame::Bytes(raw.into()));
        self
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.frames.push(Frame::Pause(duration));
        self
    }

    /// Keeps the connection open after the last frame until the backend is dropped.
    pub fn hold(mut self) -> Self {
        self.hold = true;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    fn head(&self) -> String {
        let mut headers = Headers::new();
        headers.append("Content-Type", self.content_type.as_str());
        headers.append("Connection", "close");
        if self.streaming {
            headers.append("Cache-Control", "no-cache");
        } else {
            let len: usize = self
                .frames
                .iter()
                .map(|f| match f {
                    Frame::Bytes(raw) => raw.len(),
                    Frame::Pause(_) => 0,
                })
                .sum();
            headers.append("Content-Length", len.to_string());
        }
        let reason = self.status.canonical_reason().unwrap_or("Unknown");
        format!("HTTP/1.1 {} {reason}\r\n{headers}\r\n", self.status.as_u16())
    }
}

pub(crate) struct MockBackendBuilder {
    routes: Vec<(String, String, Handler)>,
}

impl MockBackendBuilder {
    /// Answers `method path` with `handler(request, attempt)`, where `attempt`
    /// counts earlier requests to the same route from zero.
    pub fn route<F>(mut self, method: &str, path: &str, handler: F) -> Self
    where
        F: Fn(&RecordedRequest, usize) -> Reply + Send + Sync + 'static,
    {
        self.routes
            .push((method.to_owned(), path.to_owned(), Arc::new(handler)));
        self
    }

    pub async fn start(self) -> MockBackend {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        let (shutdown, _) = watch::channel(());

        let state = Arc::new(State {
            routes: self.routes,
            requests: Mutex::new(Vec::new()),
            shutdown: shutdown.subscribe(),
        });
        let accept = tokio::spawn(accept_loop(listener, Arc::clone(&state)));

        MockBackend {
            addr,
            state,
            accept,
            _shutdown: shutdown,
        }
    }
}

struct State {
    routes: Vec<(String, String, Handler)>,
    requests: Mutex<Vec<RecordedRequest>>,
    shutdown: watch::Receiver<()>,
}

impl State {
    fn reply_for(&self, request: &RecordedRequest) -> Reply {
        let attempt = self
            .requests
            .lock()
            .iter()
            .filter(|r| r.method == request.method && r.path == request.path)
            .count();
        self.requests.lock().push(request.clone());

        self.routes
            .iter()
            .find(|(method, path, _)| *method == request.method && *path == request.path)
            .map(|(_, _, handler)| handler(request, attempt))
            .unwrap_or_else(|| Reply::text(404, "not found"))
    }
}

/// A running mock backend. Dropping it stops accepting and releases held streams.
pub(crate) struct MockBackend {
    addr: SocketAddr,
    state: Arc<State>,
    accept: JoinHandle<()>,
    _shutdown: watch::Sender<()>,
}

impl MockBackend {
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder { routes: Vec::new() }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// An address nothing is listening on.
    pub async fn unused_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind probe listener");
        listener.local_addr().expect("probe address")
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<State>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "mock backend accept failed");
                continue;
            }
        };
        debug!(peer = %peer, "mock backend connection");
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                debug!(peer = %peer, error = %e, "mock backend connection ended");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<State>) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);
    let request = loop {
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
        match RecordedRequest::parse(&buf) {
            Some(Ok(request)) => break request,
            Some(Err(e)) => {
                let reply = Reply::text(400, format!("Bad Request: {e}"));
                return write_reply(&mut stream, &reply, &state).await;
            }
            None => continue,
        }
    };

    let reply = state.reply_for(&request);
    write_reply(&mut stream, &reply, &state).await
}

async fn write_reply(stream: &mut TcpStream, reply: &Reply, state: &State) -> std::io::Result<()> {
    stream.write_all(reply.head().as_bytes()).await?;
    stream.flush().await?;
    for frame in &reply.frames {
        match frame {
            Frame::Bytes(raw) => {
                stream.write_all(raw.as_bytes()).await?;
                stream.flush().await?;
            }
            Frame::Pause(duration) => tokio::time::sleep(*duration).await,
        }
    }

    if reply.hold {
        let mut shutdown = state.shutdown.clone();
        // Resolves with an error once the backend (and its sender) is dropped.
        let _ = shutdown.changed().await;
    }
    stream.shutdown().await
}
