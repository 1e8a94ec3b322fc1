use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use crate::error::HttpError;
use crate::http::headers::HeaderMap;
use crate::http::request::Method;
use crate::http::writer::{LAST_CHUNK, encode_chunk, serialize_head};

/// HTTP status codes supported by the server.
///
/// Common HTTP status codes used in responses:
/// - `Ok` (200): Request successful
/// - `Created` (201): Resource created successfully
/// - `NoContent` (204): Successful request with no content
/// - `NotModified` (304): Cached representation is still valid
/// - `BadRequest` (400): Malformed request
/// - `NotFound` (404): Resource not found
/// - `MethodNotAllowed` (405): HTTP method not supported
/// - `InternalServerError` (500): Server error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use tether::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use tether::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    /// Whether a response with this status may carry a message body.
    ///
    /// # Example
    ///
    /// ```
    /// # use tether::http::response::StatusCode;
    /// assert!(StatusCode::Ok.allows_body());
    /// assert!(!StatusCode::NoContent.allows_body());
    /// ```
    pub fn allows_body(&self) -> bool {
        !matches!(self, StatusCode::NoContent | StatusCode::NotModified)
    }
}

pub type ResponseId = u64;

/// What a [`Response`] asks of its connection. Commands from one response
/// are applied in the order they were issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCommand {
    Write { id: ResponseId, data: Bytes },
    Flush { id: ResponseId },
    /// The response is complete.
    Done { id: ResponseId },
    /// The response was dropped without being completed.
    Abandoned { id: ResponseId },
}

impl ResponseCommand {
    pub fn id(&self) -> ResponseId {
        match self {
            ResponseCommand::Write { id, .. }
            | ResponseCommand::Flush { id }
            | ResponseCommand::Done { id }
            | ResponseCommand::Abandoned { id } => *id,
        }
    }
}

/// How far the connection got with the bytes of its active response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseProgress {
    pub id: ResponseId,
    /// Bytes of this response queued on the transport so far.
    pub queued: u64,
    /// Connection-wide offset just past the last queued byte of this response.
    pub end_offset: u64,
}

/// Connection state published to every [`Response`] on that connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatus {
    /// Number of times the transmit queue has fully drained.
    pub drain_cycles: u64,
    /// Bytes confirmed written since the connection opened.
    pub confirmed: u64,
    pub progress: Option<ResponseProgress>,
    /// The transport is gone.
    pub closed: bool,
}

impl LinkStatus {
    /// True once the first `queued` bytes of response `id` are queued and
    /// confirmed written.
    pub fn has_written(&self, id: ResponseId, queued: u64) -> bool {
        self.progress
            .is_some_and(|p| p.id == id && p.queued >= queued && self.confirmed >= p.end_offset)
    }
}

/// Keep-alive rule for a request: HTTP/1.1 or later without `connection: close`.
///
/// `headers` are expected to be lower-cased already.
pub fn wants_keep_alive(http_major: u8, http_minor: u8, headers: &HeaderMap) -> bool {
    !(http_major < 1 || http_minor < 1 || headers.get("connection") == Some("close"))
}

/// The outbound half of an exchange.
///
/// `keep_alive` and `last` are fixed when the response is created. Bytes are
/// handed to the owning connection; completion is signalled with
/// [`end`](Self::end), after which the connection either closes (`last`) or
/// waits for the next request.
///
/// Responses to `HEAD` and responses with a bodyless status (204, 304) never
/// put body bytes on the wire.
#[derive(Debug)]
pub struct Response {
    id: ResponseId,
    method: Method,
    keep_alive: bool,
    last: bool,
    headers: HeaderMap,
    head_written: bool,
    chunked: bool,
    body_allowed: bool,
    finished: bool,
    queued: u64,
    commands: mpsc::UnboundedSender<ResponseCommand>,
    link: watch::Receiver<LinkStatus>,
}

impl Response {
    pub fn new(
        id: ResponseId,
        method: Method,
        keep_alive: bool,
        commands: mpsc::UnboundedSender<ResponseCommand>,
        link: watch::Receiver<LinkStatus>,
    ) -> Self {
        Self {
            id,
            method,
            keep_alive,
            last: !keep_alive,
            headers: HeaderMap::new(),
            head_written: false,
            chunked: false,
            body_allowed: method != Method::HEAD,
            finished: false,
            queued: 0,
            commands,
            link,
        }
    }

    pub fn id(&self) -> ResponseId {
        self.id
    }

    /// Method of the request this response answers.
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Whether the connection closes once this response completes.
    pub fn is_last(&self) -> bool {
        self.last
    }

    /// Adds or replaces a header. Ignored once the head has been written.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if self.head_written {
            tracing::warn!(response = self.id, "header set after head was written, ignoring");
            return;
        }
        self.headers.insert(key, value);
    }

    /// Writes the status line and headers.
    ///
    /// Adds a `Connection` header matching the keep-alive decision. A
    /// keep-alive response that may carry a body and has no `Content-Length`
    /// is sent chunked.
    pub fn write_head(&mut self, status: StatusCode) {
        if self.head_written {
            tracing::warn!(response = self.id, "head already written");
            return;
        }
        self.head_written = true;
        self.body_allowed &= status.allows_body();

        if !self.headers.contains_key("connection") {
            let value = if self.keep_alive { "keep-alive" } else { "close" };
            self.headers.insert("Connection", value);
        }
        if self.keep_alive
            && self.body_allowed
            && !self.headers.contains_key("content-length")
            && !self.headers.contains_key("transfer-encoding")
        {
            self.headers.insert("Transfer-Encoding", "chunked");
            self.chunked = true;
        }

        let head = serialize_head(status, &self.headers);
        self.send_bytes(head);
    }

    /// Writes body bytes, sending a `200 OK` head first if none was written.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        if self.finished {
            return;
        }
        if !self.head_written {
            self.write_head(StatusCode::Ok);
        }

        let data = data.as_ref();
        if data.is_empty() {
            return;
        }
        if !self.body_allowed {
            tracing::trace!(response = self.id, bytes = data.len(), "response has no body, dropping write");
            return;
        }
        let payload = if self.chunked {
            encode_chunk(data)
        } else {
            data.to_vec()
        };
        self.send_bytes(payload);
    }

    /// Asks the connection to push queued bytes out now.
    pub fn flush(&self) {
        self.send(ResponseCommand::Flush { id: self.id });
    }

    /// Writes the final bytes and completes the response.
    ///
    /// When the head has not been written yet and no `Content-Length` was
    /// set, the length of `data` is used. For `HEAD` that is the length the
    /// equivalent `GET` would have had.
    pub fn end(mut self, data: impl AsRef<[u8]>) {
        let data = data.as_ref();
        if !self.head_written && !self.headers.contains_key("content-length") {
            self.headers.insert("Content-Length", data.len().to_string());
        }
        self.write(data);
        if self.chunked {
            self.send_bytes(LAST_CHUNK.to_vec());
        }
        self.finished = true;
        self.send(ResponseCommand::Done { id: self.id });
    }

    /// True once the transport of the owning connection is gone.
    pub fn is_connection_closed(&self) -> bool {
        self.link.borrow().closed || self.commands.is_closed()
    }

    /// Resolves when the transport of the owning connection is gone.
    pub async fn connection_closed(&mut self) {
        let _ = self.link.wait_for(|status| status.closed).await;
    }

    /// Waits until every byte this response has written so far is confirmed
    /// sent. Resolves at once if nothing is outstanding.
    ///
    /// Fails with [`HttpError::ConnectionLost`] if the transport goes away first.
    pub async fn drained(&mut self) -> Result<(), HttpError> {
        let (id, queued) = (self.id, self.queued);
        if queued == 0 {
            return Ok(());
        }
        let status = *self
            .link
            .wait_for(|status| status.has_written(id, queued) || status.closed)
            .await
            .map_err(|_| HttpError::ConnectionLost)?;
        if status.has_written(id, queued) {
            Ok(())
        } else {
            Err(HttpError::ConnectionLost)
        }
    }

    fn send_bytes(&mut self, data: Vec<u8>) {
        self.queued += data.len() as u64;
        self.send(ResponseCommand::Write {
            id: self.id,
            data: Bytes::from(data),
        });
    }

    fn send(&self, command: ResponseCommand) {
        if self.commands.send(command).is_err() {
            tracing::trace!(response = self.id, "connection gone, dropping response command");
        }
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        if !self.finished {
            self.send(ResponseCommand::Abandoned { id: self.id });
        }
    }
}
