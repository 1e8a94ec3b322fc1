use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::{Notify, mpsc};

use crate::error::HttpError;
use crate::http::headers::HeaderMap;
use crate::http::url::RequestUrl;

/// HTTP request methods.
///
/// Represents the HTTP method/verb of a request. A request line carrying any
/// other token is rejected by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// CONNECT - Establish a tunnel to the target authority
    CONNECT,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// TRACE - Loop the request back
    TRACE,
    /// PATCH - Partial modification of a resource
    PATCH,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Arguments
    ///
    /// * `s` - String representation of the method (case-sensitive, typically uppercase)
    ///
    /// # Returns
    ///
    /// `Some(Method)` if the string matches a known method, `None` otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// # use tether::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "HEAD" => Some(Method::HEAD),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "CONNECT" => Some(Method::CONNECT),
            "OPTIONS" => Some(Method::OPTIONS),
            "TRACE" => Some(Method::TRACE),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::CONNECT => "CONNECT",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
            Method::PATCH => "PATCH",
        }
    }
}

/// Body and completion events delivered to the application after a request
/// has been published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    /// A body chunk, in stream order.
    Data(Bytes),
    /// The message completed successfully. No further events follow.
    End,
    /// The message was aborted. No further events follow.
    Error(HttpError),
}

/// Body bytes delivered to a [`Request`] that the application has not
/// taken yet. The connection stops reading while this is too large.
#[derive(Debug, Default)]
pub struct BodyBacklog {
    queued: AtomicUsize,
    taken: Notify,
}

impl BodyBacklog {
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Resolves after the application has taken body bytes.
    pub async fn taken(&self) {
        self.taken.notified().await
    }

    fn add(&self, n: usize) {
        self.queued.fetch_add(n, Ordering::AcqRel);
    }

    fn take(&self, n: usize) {
        let _ = self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |q| Some(q.saturating_sub(n)));
        self.taken.notify_one();
    }

    fn clear(&self) {
        self.queued.store(0, Ordering::Release);
        self.taken.notify_one();
    }
}

/// An incoming HTTP request.
///
/// Head fields are final by the time the application sees the request; the
/// body streams in afterwards through [`next_event`](Self::next_event).
#[derive(Debug)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Protocol version as `"major.minor"`, e.g. `"1.1"`
    pub version: String,
    /// The request target, split into components
    pub url: RequestUrl,
    /// Lower-cased headers in first-seen order
    pub headers: HeaderMap,
    /// Peer IP address
    pub remote_address: String,
    /// Peer TCP port
    pub remote_port: u16,
    successful: bool,
    events: mpsc::UnboundedReceiver<RequestEvent>,
    backlog: Arc<BodyBacklog>,
}

/// Connection-side handle feeding a published [`Request`].
#[derive(Debug)]
pub struct RequestSink {
    events: mpsc::UnboundedSender<RequestEvent>,
    finished: bool,
    backlog: Arc<BodyBacklog>,
}

impl Request {
    /// Creates a request together with the sink that feeds its body events.
    pub fn channel(
        method: Method,
        version: impl Into<String>,
        url: RequestUrl,
        headers: HeaderMap,
        peer: SocketAddr,
    ) -> (Request, RequestSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backlog = Arc::new(BodyBacklog::default());
        let request = Request {
            method,
            version: version.into(),
            url,
            headers,
            remote_address: peer.ip().to_string(),
            remote_port: peer.port(),
            successful: false,
            events: rx,
            backlog: backlog.clone(),
        };
        let sink = RequestSink {
            events: tx,
            finished: false,
            backlog,
        };
        (request, sink)
    }

    /// Retrieves a header value by name (case-insensitive).
    ///
    /// # Arguments
    ///
    /// * `key` - Header name to look up
    ///
    /// # Returns
    ///
    /// `Some(&str)` with the header value if present, `None` otherwise.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Whether the message-complete event has been observed.
    pub fn is_successful(&self) -> bool {
        self.successful
    }

    /// Waits for the next body or completion event.
    ///
    /// Returns `None` once the stream is over.
    pub async fn next_event(&mut self) -> Option<RequestEvent> {
        let event = self.events.recv().await;
        self.observe(event)
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    pub fn try_next_event(&mut self) -> Option<RequestEvent> {
        let event = self.events.try_recv().ok();
        self.observe(event)
    }

    /// Collects the whole body.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, HttpError> {
        let mut body = Vec::with_capacity(self.content_length());
        while let Some(event) = self.next_event().await {
            match event {
                RequestEvent::Data(chunk) => body.extend_from_slice(&chunk),
                RequestEvent::End => return Ok(body),
                RequestEvent::Error(err) => return Err(err),
            }
        }
        Err(HttpError::ConnectionLost)
    }

    fn observe(&mut self, event: Option<RequestEvent>) -> Option<RequestEvent> {
        match &event {
            Some(RequestEvent::Data(chunk)) => self.backlog.take(chunk.len()),
            Some(RequestEvent::End) => self.successful = true,
            _ => {}
        }
        event
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        self.backlog.clear();
    }
}

impl RequestSink {
    /// Forwards one body chunk. Dropped silently if the application has
    /// already let go of the request.
    pub fn data(&self, chunk: &[u8]) {
        if self.finished {
            return;
        }
        match self.events.send(RequestEvent::Data(Bytes::copy_from_slice(chunk))) {
            Ok(()) => self.backlog.add(chunk.len()),
            Err(_) => tracing::trace!("request dropped by application, discarding body chunk"),
        }
    }

    /// Body bytes sent but not yet taken by the application.
    pub fn queued_bytes(&self) -> usize {
        self.backlog.queued()
    }

    pub fn backlog(&self) -> Arc<BodyBacklog> {
        self.backlog.clone()
    }

    pub fn complete(&mut self) {
        self.finish(RequestEvent::End);
    }

    pub fn abort(&mut self, err: HttpError) {
        self.finish(RequestEvent::Error(err));
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self, event: RequestEvent) {
        if self.finished {
            return;
        }
        self.finished = true;
        let _ = self.events.send(event);
    }
}
