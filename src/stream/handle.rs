//! The live stream handle and the task that drives its connection.
//!
//! A [`StreamHandle`] is a small state machine:
//!
//! ```text
//! CONNECTING ──▶ OPEN ──▶ (message)* ──┐
//!     ▲                                │ connection lost
//!     └──────── wait reconnect delay ◀─┘
//!
//! any state ──cancel()──▶ CLOSED      (no further events, no reconnect)
//! any state ──fatal error──▶ CLOSED   (error event, then close event)
//! ```
//!
//! Events reach listeners in the order the server emitted them. Delivery runs
//! under a re-entrant gate that [`StreamHandle::cancel`] also takes, so once
//! `cancel` returns no listener will be invoked again, and a listener may
//! itself cancel the stream without deadlocking.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::decoder::{Message, SseDecoder};
use super::event::{EventFilter, ReadyState, StreamError, StreamEvent};
use crate::http::{Request, StatusCode};
use crate::transport::{Transport, TransportError};

type Listener = Arc<dyn Fn(&StreamEvent) + Send + Sync + 'static>;

/// Identifies a listener registered on a [`StreamHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// State shared between the handle, its cancellers, its event streams and the driver task.
struct Shared {
    url: String,
    state: AtomicU8,
    // No listener is invoked once this is set.
    closed: AtomicBool,
    // Set only by caller cancellation; event streams stop immediately.
    cancelled: AtomicBool,
    gate: ReentrantMutex<()>,
    listeners: Mutex<Vec<(ListenerId, EventFilter, Listener)>>,
    next_listener: AtomicU64,
    start: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn new(url: String) -> Self {
        Self {
            url,
            state: AtomicU8::new(ReadyState::Connecting as u8),
            closed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            gate: ReentrantMutex::new(()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            start: Notify::new(),
            task: Mutex::new(None),
        }
    }

    fn state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    // Closed is terminal; later transitions are ignored.
    fn set_state(&self, next: ReadyState) {
        let closed = ReadyState::Closed as u8;
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != closed).then_some(next as u8)
            });
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn add_listener(&self, filter: EventFilter, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        {
            let mut listeners = self.listeners.lock();
            if !self.is_closed() {
                listeners.push((id, filter, listener));
            }
        }
        self.start.notify_one();
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _, _)| *existing != id);
        listeners.len() < before
    }

    /// Invokes every matching listener. Returns `false` once the stream is closed.
    fn deliver(&self, event: &StreamEvent) -> bool {
        let _gate = self.gate.lock();
        if self.is_closed() {
            return false;
        }

        let targets: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, filter, _)| filter.matches(event))
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();

        for listener in targets {
            if self.is_closed() {
                return false;
            }
            listener(event);
        }
        !self.is_closed()
    }

    fn shut(&self) {
        self.state
            .store(ReadyState::Closed as u8, Ordering::Release);
        self.closed.store(true, Ordering::Release);
        self.listeners.lock().clear();
    }

    fn fail(&self, error: StreamError) {
        warn!(url = %self.url, error = %error, "stream failed; closing");
        self.set_state(ReadyState::Closed);
        if self.deliver(&StreamEvent::Error(error)) {
            self.deliver(&StreamEvent::Close);
        }
        let _gate = self.gate.lock();
        self.shut();
    }

    fn cancel(&self) {
        {
            let _gate = self.gate.lock();
            let already = self.cancelled.swap(true, Ordering::AcqRel);
            if already {
                return;
            }
            self.shut();
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        debug!(url = %self.url, "stream cancelled");
    }
}

/// A live server-sent-event connection bound to one query.
///
/// Returned by [`Client::stream_chat`](crate::Client::stream_chat). The
/// connection attempt starts as soon as the first listener is attached
/// (through [`subscribe`](Self::subscribe), one of the `on_*` helpers, or
/// [`events`](Self::events)); attach every listener you need before awaiting.
///
/// Dropping the handle cancels the stream.
///
/// # Examples
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use chatwire::{Client, ClientConfig, StreamEvent, StreamQuery};
///
/// # async fn run() -> Result<(), chatwire::ClientError> {
/// let client = Client::new(ClientConfig::new("http://localhost:8080"))?;
/// let handle = client.stream_chat(StreamQuery::new("payments errors today").tz("UTC"))?;
///
/// let mut events = handle.events();
/// while let Some(event) = events.next().await {
///     match event {
///         StreamEvent::Message(m) if m.event == "token" => print!("{}", m.data),
///         StreamEvent::Message(m) if m.event == "done" => break,
///         _ => {}
///     }
/// }
/// handle.cancel();
/// # Ok(())
/// # }
/// ```
pub struct StreamHandle {
    shared: Arc<Shared>,
}

impl StreamHandle {
    /// Spawns the driver task on the current Tokio runtime and returns immediately.
    pub(crate) fn spawn<T: Transport>(
        url: String,
        transport: Arc<T>,
        reconnect_delay: Duration,
        max_line_len: usize,
    ) -> Result<Self, tokio::runtime::TryCurrentError> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let shared = Arc::new(Shared::new(url));
        let decoder = SseDecoder::with_max_line_len(max_line_len);
        let task = runtime.spawn(drive(Arc::clone(&shared), transport, decoder, reconnect_delay));
        *shared.task.lock() = Some(task);
        Ok(Self { shared })
    }

    /// Returns the URL this handle connects to.
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Returns the current connection state.
    ///
    /// Stays [`ReadyState::Connecting`] until a listener is attached, since no
    /// request is sent before then.
    pub fn ready_state(&self) -> ReadyState {
        self.shared.state()
    }

    /// Registers `listener` for the events `filter` selects.
    ///
    /// `filter` accepts an [`EventFilter`] or an event name: `"open"`,
    /// `"error"`, `"close"`, or any message name such as `"message"` or `"token"`.
    /// Listeners run on the driver task and must not block.
    pub fn subscribe<F>(&self, filter: impl Into<EventFilter>, listener: F) -> ListenerId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.shared.add_listener(filter.into(), Arc::new(listener))
    }

    /// Registers `listener` for messages named `name`.
    pub fn on<F>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.subscribe(EventFilter::Named(name.to_owned()), move |event| {
            if let StreamEvent::Message(message) = event {
                listener(message);
            }
        })
    }

    /// Registers `listener` for default-named (`"message"`) events.
    pub fn on_message<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.on(super::decoder::DEFAULT_EVENT_NAME, listener)
    }

    /// Registers `listener` for every (re)connection.
    pub fn on_open<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(EventFilter::Open, move |_| listener())
    }

    /// Registers `listener` for connection-level errors.
    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        self.subscribe(EventFilter::Error, move |event| {
            if let StreamEvent::Error(error) = event {
                listener(error);
            }
        })
    }

    /// Registers `listener` for the close that follows a fatal error.
    pub fn on_close<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(EventFilter::Close, move |_| listener())
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.remove_listener(id)
    }

    /// Returns every event as an async [`Stream`].
    ///
    /// The stream ends after a fatal close, and yields nothing further once the
    /// handle is cancelled.
    pub fn events(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(EventFilter::All, move |event| {
            let _ = tx.send(event.clone());
        });
        EventStream {
            rx,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns a cloneable token that cancels this stream, e.g. from inside a listener.
    pub fn canceller(&self) -> Canceller {
        Canceller {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Closes the connection for good.
    ///
    /// Idempotent. After it returns, no listener fires and no reconnect happens.
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.shared.cancel();
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("url", &self.shared.url)
            .field("state", &self.shared.state())
            .finish()
    }
}

/// Cancels a [`StreamHandle`] without owning it.
///
/// Holds only a weak reference, so a listener that captures one does not keep
/// the stream alive.
#[derive(Debug, Clone)]
pub struct Canceller {
    shared: Weak<Shared>,
}

impl Canceller {
    /// Same as [`StreamHandle::cancel`]. A no-op once the handle is gone.
    pub fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.cancel();
        }
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared").field("url", &self.url).finish_non_exhaustive()
    }
}

/// Async sequence of a handle's events. See [`StreamHandle::events`].
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    shared: Arc<Shared>,
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.shared.cancelled.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

enum Outcome {
    // Listeners are gone or the handle was cancelled.
    Stopped,
    Dropped(StreamError),
    Fatal(StreamError),
}

async fn drive<T: Transport>(
    shared: Arc<Shared>,
    transport: Arc<T>,
    mut decoder: SseDecoder,
    mut delay: Duration,
) {
    shared.start.notified().await;

    loop {
        match connect_once(&shared, transport.as_ref(), &mut decoder, &mut delay).await {
            Outcome::Stopped => return,
            Outcome::Fatal(error) => {
                shared.fail(error);
                return;
            }
            Outcome::Dropped(error) => {
                warn!(url = %shared.url, error = %error, "stream dropped");
                shared.set_state(ReadyState::Connecting);
                if !shared.deliver(&StreamEvent::Error(error)) {
                    return;
                }
            }
        }

        debug!(url = %shared.url, delay_ms = delay.as_millis() as u64, "reconnecting");
        tokio::time::sleep(delay).await;
        if shared.is_closed() {
            return;
        }
    }
}

async fn connect_once<T: Transport>(
    shared: &Shared,
    transport: &T,
    decoder: &mut SseDecoder,
    delay: &mut Duration,
) -> Outcome {
    let mut request = Request::get(shared.url.as_str())
        .header("Accept", "text/event-stream")
        .header("Cache-Control", "no-cache");
    if !decoder.last_event_id().is_empty() {
        request = request.header("Last-Event-ID", decoder.last_event_id());
    }

    let response = match transport.open(request).await {
        Ok(response) => response,
        Err(e @ TransportError::InvalidUrl { .. }) => {
            return Outcome::Fatal(StreamError::InvalidUrl(e.to_string()));
        }
        Err(e) => return Outcome::Dropped(StreamError::Transport(e.to_string())),
    };

    if response.status != StatusCode::OK {
        return Outcome::Fatal(StreamError::Status(response.status));
    }
    if response.headers.content_type().as_deref() != Some("text/event-stream") {
        let raw = response.headers.get("content-type").map(str::to_owned);
        return Outcome::Fatal(StreamError::ContentType(raw));
    }

    shared.set_state(ReadyState::Open);
    info!(url = %shared.url, "stream open");
    if !shared.deliver(&StreamEvent::Open) {
        return Outcome::Stopped;
    }

    decoder.reset_connection();
    let mut body = response.body;
    let mut batch = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Outcome::Dropped(StreamError::Transport(e.to_string())),
        };
        let decoded = decoder.feed_into(&chunk, &mut batch);
        for message in batch.drain(..) {
            if !shared.deliver(&StreamEvent::Message(message)) {
                return Outcome::Stopped;
            }
        }
        if let Some(retry) = decoder.take_retry() {
            *delay = retry;
        }
        if let Err(e) = decoded {
            return Outcome::Dropped(e.into());
        }
    }

    Outcome::Dropped(StreamError::Disconnected)
}
