#![allow(dead_code)]

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use tether::error::HttpError;
use tether::http::connection::{Connection, RequestHandler, ResponseCommands, Transport};
use tether::http::parser::ParserLimits;
use tether::http::request::Request;
use tether::http::response::Response;

/// Scripted transport: tests push inbound bytes and inspect what was written.
#[derive(Debug)]
pub struct MockTransport {
    pub peer: SocketAddr,
    pub inbound: BytesMut,
    pub written: Vec<u8>,
    pub flushes: usize,
    pub closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            peer: "127.0.0.1:40000".parse().unwrap(),
            inbound: BytesMut::new(),
            written: Vec::new(),
            flushes: 0,
            closed: false,
        }
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }
}

impl Transport for MockTransport {
    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn bytes_available(&self) -> usize {
        self.inbound.len()
    }

    fn read_all(&mut self) -> Bytes {
        self.inbound.split().freeze()
    }

    fn write(&mut self, data: &[u8]) {
        self.written.extend_from_slice(data);
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Handler that keeps every exchange and failure for later inspection.
#[derive(Clone, Default)]
pub struct Recorder {
    pub exchanges: Rc<RefCell<Vec<(Request, Response)>>>,
    pub failures: Rc<RefCell<Vec<HttpError>>>,
}

impl Recorder {
    pub fn count(&self) -> usize {
        self.exchanges.borrow().len()
    }

    /// Removes and returns the oldest recorded exchange.
    pub fn next(&self) -> (Request, Response) {
        self.exchanges.borrow_mut().remove(0)
    }

    pub fn failures(&self) -> Vec<HttpError> {
        self.failures.borrow().clone()
    }
}

impl RequestHandler for Recorder {
    fn on_request(&mut self, request: Request, response: Response) {
        self.exchanges.borrow_mut().push((request, response));
    }

    fn on_request_failed(&mut self, error: &HttpError) {
        self.failures.borrow_mut().push(error.clone());
    }
}

pub type TestConnection = Connection<MockTransport, Recorder>;

pub fn connection() -> (TestConnection, ResponseCommands, Recorder) {
    connection_with_limits(ParserLimits::default())
}

pub fn connection_with_limits(limits: ParserLimits) -> (TestConnection, ResponseCommands, Recorder) {
    let recorder = Recorder::default();
    let (conn, commands) = Connection::new(1, MockTransport::new(), recorder.clone(), limits);
    (conn, commands, recorder)
}

/// Delivers `data` as one readable notification.
pub fn feed(conn: &mut TestConnection, data: &[u8]) {
    conn.transport_mut().inbound.extend_from_slice(data);
    conn.on_readable();
}
