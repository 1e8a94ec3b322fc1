//! Per-connection protocol coordinator.
//!
//! A [`Connection`] sits between a [`Transport`] and the application. It is
//! event driven: whoever owns the socket calls [`Connection::on_readable`],
//! [`Connection::on_bytes_written`] and [`Connection::on_disconnected`] as
//! those things happen, and forwards [`ResponseCommand`]s from the
//! application's [`Response`] handles to [`Connection::apply`]. Nothing here
//! blocks or spawns.

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, trace, warn};

use crate::error::HttpError;
use crate::http::message::{MessagePhase, RequestBuilder};
use crate::http::parser::{HttpParser, ParseError, ParsedHead, ParserEvents, ParserLimits};
use crate::http::request::{BodyBacklog, Request, RequestSink};
use crate::http::response::{
    LinkStatus, Response, ResponseCommand, ResponseId, ResponseProgress, StatusCode,
    wants_keep_alive,
};
use crate::http::writer::error_reply;

/// Byte stream underneath a [`Connection`].
///
/// Reads and writes never block: `read_all` returns whatever is buffered and
/// `write` only queues. The owner reports progress back through the
/// connection's `on_*` methods.
pub trait Transport {
    fn peer_addr(&self) -> SocketAddr;
    fn bytes_available(&self) -> usize;
    fn read_all(&mut self) -> Bytes;
    fn write(&mut self, data: &[u8]);
    fn flush(&mut self);
    /// Closes from this side once queued bytes are out.
    fn close(&mut self);
}

/// Application side of a connection.
pub trait RequestHandler {
    /// Called once per message, after its headers, before any body event.
    fn on_request(&mut self, request: Request, response: Response);

    /// Called when a message fails to parse. The connection closes afterwards.
    fn on_request_failed(&mut self, error: &HttpError) {
        let _ = error;
    }
}

impl<F> RequestHandler for F
where
    F: FnMut(Request, Response),
{
    fn on_request(&mut self, request: Request, response: Response) {
        self(request, response)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    /// Close requested from this side; queued output still goes out.
    Closing,
    Disconnected,
    /// An internal-consistency fault stopped all processing.
    Failed,
}

/// Bytes queued to the transport versus bytes it confirmed as sent.
///
/// `pos <= len` always holds; both reset to zero when they meet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmitCounter {
    len: usize,
    pos: usize,
}

impl TransmitCounter {
    pub fn enqueue(&mut self, n: usize) {
        self.len += n;
    }

    /// Records `n` confirmed bytes. Returns `true` if this drained the queue.
    pub fn confirm(&mut self, n: usize) -> Result<bool, HttpError> {
        let outstanding = self.len - self.pos;
        if n > outstanding {
            return Err(HttpError::TransmitAccounting {
                confirmed: n,
                outstanding,
            });
        }
        if n == 0 {
            return Ok(false);
        }

        self.pos += n;
        if self.pos == self.len {
            self.len = 0;
            self.pos = 0;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Receiving end of the commands issued by a connection's responses.
#[derive(Debug)]
pub struct ResponseCommands {
    rx: mpsc::UnboundedReceiver<ResponseCommand>,
}

impl ResponseCommands {
    pub async fn recv(&mut self) -> Option<ResponseCommand> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ResponseCommand> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveResponse {
    id: ResponseId,
    last: bool,
    done: bool,
}

/// Parser-facing state of the message in flight.
struct Exchange<H> {
    connection: u64,
    peer: SocketAddr,
    handler: H,
    builder: RequestBuilder,
    request: Option<RequestSink>,
    response: Option<ActiveResponse>,
    next_response: ResponseId,
    commands: mpsc::UnboundedSender<ResponseCommand>,
    link: watch::Receiver<LinkStatus>,
    failure: Option<HttpError>,
}

impl<H> Exchange<H> {
    /// The current message is fully read but its response is still open.
    fn awaiting_response(&self) -> bool {
        self.builder.phase() == MessagePhase::MessageComplete
            && self.response.is_some_and(|r| !r.done)
    }

    fn body_queued(&self) -> usize {
        self.request.as_ref().map_or(0, RequestSink::queued_bytes)
    }
}

impl<H: RequestHandler> ParserEvents for Exchange<H> {
    fn on_message_begin(&mut self) {
        if let Some(sink) = self.request.as_mut() {
            sink.abort(HttpError::ConnectionLost);
        }
        self.builder.reset();
        self.request = None;
        self.response = None;
        self.failure = None;
    }

    fn on_url(&mut self, chunk: &[u8]) {
        self.builder.push_url(chunk);
    }

    fn on_header_field(&mut self, chunk: &[u8]) {
        self.builder.header_field(chunk);
    }

    fn on_header_value(&mut self, chunk: &[u8]) {
        self.builder.header_value(chunk);
    }

    fn on_headers_complete(&mut self, head: &ParsedHead) -> ControlFlow<()> {
        let (request, sink) = match self.builder.complete_headers(head, self.peer) {
            Ok(parts) => parts,
            Err(err) => {
                self.failure = Some(err);
                return ControlFlow::Break(());
            }
        };

        let keep_alive = wants_keep_alive(head.http_major, head.http_minor, &request.headers);
        let id = self.next_response;
        self.next_response += 1;
        let response = Response::new(
            id,
            head.method,
            keep_alive,
            self.commands.clone(),
            self.link.clone(),
        );

        debug!(
            connection = self.connection,
            method = ?request.method,
            path = %request.path(),
            version = %request.version,
            keep_alive,
            "New request"
        );

        self.request = Some(sink);
        self.response = Some(ActiveResponse {
            id,
            last: !keep_alive,
            done: false,
        });
        self.handler.on_request(request, response);
        ControlFlow::Continue(())
    }

    fn on_body(&mut self, chunk: &[u8]) {
        self.builder.body_chunk();
        if let Some(sink) = &self.request {
            sink.data(chunk);
        }
    }

    fn on_message_complete(&mut self) {
        self.builder.complete_message();
        if let Some(sink) = self.request.as_mut() {
            sink.complete();
        }
    }
}

/// Owns the transport, the parser and the active request/response pair of
/// one client connection.
///
/// Exactly one exchange is in flight at a time. Input that arrives for the
/// next message while the current response is still open is held back and
/// parsed once that response is done.
///
/// Held-back input and unconsumed body bytes are each capped at
/// `max_head_size`; past that the connection stops taking bytes from the
/// transport until the application catches up.
pub struct Connection<T, H> {
    id: u64,
    state: ConnectionState,
    transport: T,
    parser: HttpParser,
    exchange: Exchange<H>,
    backlog: BytesMut,
    input_limit: usize,
    transmit: TransmitCounter,
    queued_total: u64,
    link: watch::Sender<LinkStatus>,
}

impl<T: Transport, H: RequestHandler> Connection<T, H> {
    pub fn new(id: u64, transport: T, handler: H, limits: ParserLimits) -> (Self, ResponseCommands) {
        let (commands, rx) = mpsc::unbounded_channel();
        let (link, link_rx) = watch::channel(LinkStatus::default());
        let peer = transport.peer_addr();

        let connection = Self {
            id,
            state: ConnectionState::Open,
            transport,
            parser: HttpParser::new(limits),
            exchange: Exchange {
                connection: id,
                peer,
                handler,
                builder: RequestBuilder::new(),
                request: None,
                response: None,
                next_response: 0,
                commands,
                link: link_rx,
                failure: None,
            },
            backlog: BytesMut::new(),
            input_limit: limits.max_head_size.max(1),
            transmit: TransmitCounter::default(),
            queued_total: 0,
            link,
        };
        (connection, ResponseCommands { rx })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.exchange.peer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn transmit_len(&self) -> usize {
        self.transmit.len()
    }

    pub fn transmit_pos(&self) -> usize {
        self.transmit.pos()
    }

    /// How many times the transmit queue has drained so far.
    pub fn drain_cycles(&self) -> u64 {
        self.link.borrow().drain_cycles
    }

    /// Bytes read from the transport but not yet handed to the parser.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Body bytes delivered to the current request but not yet taken.
    pub fn body_queued(&self) -> usize {
        self.exchange.body_queued()
    }

    /// Whether the owner should read more from the socket. False while the
    /// transport still holds bytes this connection has not taken.
    pub fn wants_read(&self) -> bool {
        self.state == ConnectionState::Open
            && self.transport.bytes_available() == 0
            && !self.input_full()
    }

    /// Body backlog of the current request, signalled whenever the
    /// application takes bytes from it.
    pub fn body_backlog(&self) -> Option<Arc<BodyBacklog>> {
        self.exchange.request.as_ref().map(RequestSink::backlog)
    }

    /// Reads what the transport has and feeds it to the parser, until the
    /// transport is empty or held input reaches its cap.
    pub fn on_readable(&mut self) {
        while self.state == ConnectionState::Open && self.transport.bytes_available() > 0 {
            if self.input_full() {
                trace!(
                    connection = self.id,
                    held = self.backlog.len(),
                    body = self.body_queued(),
                    "input full, pausing reads"
                );
                return;
            }
            let data = self.transport.read_all();
            trace!(connection = self.id, bytes = data.len(), "read");
            self.backlog.extend_from_slice(&data);
            self.process_backlog();
        }
    }

    /// Queues bytes on the transport.
    pub fn write(&mut self, data: &[u8]) {
        self.queue(data);
    }

    pub fn flush(&mut self) {
        if matches!(self.state, ConnectionState::Open | ConnectionState::Closing) {
            self.transport.flush();
        }
    }

    /// Records `count` bytes confirmed sent by the transport.
    ///
    /// Confirming more than is outstanding is a transport contract breach:
    /// the connection stops processing and the error is returned.
    pub fn on_bytes_written(&mut self, count: usize) -> Result<(), HttpError> {
        match self.transmit.confirm(count) {
            Ok(drained) => {
                if count > 0 {
                    self.link.send_modify(|status| {
                        status.confirmed += count as u64;
                        if drained {
                            status.drain_cycles += 1;
                        }
                    });
                }
                if drained {
                    trace!(connection = self.id, "all bytes written");
                }
                Ok(())
            }
            Err(err) => {
                error!(connection = self.id, error = %err, "transmit accounting violated");
                self.state = ConnectionState::Failed;
                if let Some(sink) = self.exchange.request.as_mut() {
                    sink.abort(err.clone());
                }
                self.link.send_modify(|status| status.closed = true);
                self.transport.close();
                Err(err)
            }
        }
    }

    /// The transport is gone. Aborts the in-flight request; the connection
    /// stays alive until its open response, if any, is done or abandoned.
    pub fn on_disconnected(&mut self) {
        if matches!(self.state, ConnectionState::Disconnected | ConnectionState::Failed) {
            return;
        }
        debug!(connection = self.id, peer = %self.exchange.peer, "Disconnected");

        self.state = ConnectionState::Disconnected;
        self.backlog.clear();
        if let Some(sink) = self.exchange.request.as_mut() {
            sink.abort(HttpError::ConnectionLost);
        }
        self.link.send_modify(|status| status.closed = true);
    }

    /// Executes one command from a [`Response`]. Commands from responses
    /// that are no longer active are ignored.
    pub fn apply(&mut self, command: ResponseCommand) {
        let id = command.id();
        let active = self
            .exchange
            .response
            .is_some_and(|r| r.id == id && !r.done);
        if !active {
            trace!(connection = self.id, response = id, "stale response command");
            return;
        }

        match command {
            ResponseCommand::Write { data, .. } => {
                if self.queue(&data) {
                    self.track_response_bytes(id, data.len());
                }
            }
            ResponseCommand::Flush { .. } => self.flush(),
            ResponseCommand::Done { .. } => self.on_response_done(false),
            ResponseCommand::Abandoned { .. } => self.on_response_done(true),
        }
    }

    /// Applies every command already queued, without waiting.
    pub fn apply_pending(&mut self, commands: &mut ResponseCommands) {
        while let Some(command) = commands.try_recv() {
            self.apply(command);
        }
    }

    /// True once nothing references this connection any more: the transport
    /// is gone and the active response is done or abandoned.
    pub fn is_releasable(&self) -> bool {
        match self.state {
            ConnectionState::Failed => true,
            ConnectionState::Disconnected => self.exchange.response.is_none_or(|r| r.done),
            _ => false,
        }
    }

    fn on_response_done(&mut self, abandoned: bool) {
        let Some(active) = self.exchange.response.as_mut() else {
            return;
        };
        active.done = true;
        let last = active.last;

        if abandoned {
            warn!(connection = self.id, response = active.id, "Response dropped before completion");
        }
        debug!(connection = self.id, response = active.id, last, "Response done");

        if last || abandoned {
            self.close();
        } else {
            self.process_backlog();
            self.on_readable();
        }
    }

    fn input_full(&self) -> bool {
        self.backlog.len() >= self.input_limit || self.exchange.body_queued() >= self.input_limit
    }

    /// Returns false if the transport is gone and `data` was dropped.
    fn queue(&mut self, data: &[u8]) -> bool {
        if matches!(self.state, ConnectionState::Disconnected | ConnectionState::Failed) {
            trace!(connection = self.id, bytes = data.len(), "transport gone, dropping write");
            return false;
        }
        self.transport.write(data);
        self.transmit.enqueue(data.len());
        self.queued_total += data.len() as u64;
        true
    }

    fn track_response_bytes(&mut self, id: ResponseId, n: usize) {
        let end_offset = self.queued_total;
        self.link.send_modify(|status| {
            let queued = match status.progress {
                Some(p) if p.id == id => p.queued,
                _ => 0,
            };
            status.progress = Some(ResponseProgress {
                id,
                queued: queued + n as u64,
                end_offset,
            });
        });
    }

    fn process_backlog(&mut self) {
        while self.state == ConnectionState::Open && !self.backlog.is_empty() {
            if self.exchange.awaiting_response() {
                trace!(
                    connection = self.id,
                    queued = self.backlog.len(),
                    "response open, holding next message"
                );
                return;
            }

            match self.parser.push(&self.backlog, &mut self.exchange) {
                Ok(0) => return,
                Ok(consumed) => self.backlog.advance(consumed),
                Err(err) => {
                    self.backlog.clear();
                    self.fail_message(err);
                    return;
                }
            }
        }
    }

    /// Terminates the current message after a parse failure and closes.
    fn fail_message(&mut self, err: ParseError) {
        let error = match (err, self.exchange.failure.take()) {
            (ParseError::Aborted, Some(failure)) => failure,
            (err, _) => HttpError::MalformedRequest(err),
        };
        warn!(
            connection = self.id,
            peer = %self.exchange.peer,
            error = %error,
            "Rejecting request"
        );

        if let Some(sink) = self.exchange.request.as_mut() {
            sink.abort(error.clone());
        }
        // The application never saw this message, so answer it here.
        if self.exchange.response.is_none() {
            self.write(&error_reply(StatusCode::BadRequest));
            self.flush();
        }
        self.exchange.handler.on_request_failed(&error);
        self.close();
    }

    fn close(&mut self) {
        if self.state != ConnectionState::Open {
            return;
        }
        debug!(connection = self.id, "Closing connection");
        self.state = ConnectionState::Closing;
        self.transport.close();
    }
}
