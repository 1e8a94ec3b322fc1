//! Push-based HTTP/1.x request parser.
//!
//! [`HttpParser::push`] accepts bytes in whatever chunks the socket delivers
//! and reports what it recognizes through a [`ParserEvents`] implementation,
//! in stream order:
//!
//! ```text
//! message-begin → url → (header-field → header-value)* → headers-complete
//!               → body* → message-complete
//! ```
//!
//! The request head is tokenized with `httparse` once it is complete; the
//! body is framed here (identity or chunked) and streamed through without
//! being buffered.

use std::ops::ControlFlow;

use thiserror::Error;

use crate::http::request::Method;
use crate::http::url::{UrlField, UrlFieldTable};

/// Longest chunk-size or trailer line accepted.
const MAX_LINE_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid request method")]
    InvalidMethod,
    #[error("invalid token in request head")]
    InvalidToken,
    #[error("invalid header")]
    InvalidHeader,
    #[error("unsupported HTTP version")]
    InvalidVersion,
    #[error("invalid request target")]
    InvalidUrl,
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("invalid chunked framing")]
    InvalidChunk,
    #[error("request head larger than {0} bytes")]
    HeadTooLarge(usize),
    #[error("too many headers")]
    TooManyHeaders,
    #[error("parsing stopped by handler")]
    Aborted,
}

impl From<httparse::Error> for ParseError {
    fn from(err: httparse::Error) -> Self {
        match err {
            httparse::Error::HeaderName | httparse::Error::HeaderValue => ParseError::InvalidHeader,
            httparse::Error::Version => ParseError::InvalidVersion,
            httparse::Error::TooManyHeaders => ParseError::TooManyHeaders,
            _ => ParseError::InvalidToken,
        }
    }
}

/// Size limits applied while buffering a request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    pub max_head_size: usize,
    pub max_headers: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_head_size: 64 * 1024,
            max_headers: 64,
        }
    }
}

/// Request-line facts available from headers-complete onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHead {
    pub method: Method,
    pub http_major: u8,
    pub http_minor: u8,
}

/// Receiver of parser events.
///
/// Chunk callbacks may fire several times for one logical item; receivers
/// must append rather than replace.
pub trait ParserEvents {
    fn on_message_begin(&mut self);
    fn on_url(&mut self, chunk: &[u8]);
    fn on_header_field(&mut self, chunk: &[u8]);
    fn on_header_value(&mut self, chunk: &[u8]);
    /// Returning `Break` stops the parser with [`ParseError::Aborted`].
    fn on_headers_complete(&mut self, head: &ParsedHead) -> ControlFlow<()>;
    fn on_body(&mut self, chunk: &[u8]);
    fn on_message_complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Head,
    Body(u64),
    ChunkSize,
    ChunkData(u64),
    ChunkDataEnd,
    Trailers,
    Failed(ParseError),
}

enum Framing {
    Length(u64),
    Chunked,
}

pub struct HttpParser {
    state: State,
    limits: ParserLimits,
    head: Vec<u8>,
    line: Vec<u8>,
}

impl HttpParser {
    pub fn new(limits: ParserLimits) -> Self {
        Self {
            state: State::Idle,
            limits,
            head: Vec::new(),
            line: Vec::new(),
        }
    }

    /// Feeds `data` to the parser.
    ///
    /// Returns the number of bytes consumed. Consumption stops right after a
    /// message-complete event so the caller decides when the next message may
    /// start; any bytes past that point are left for a later call. After an
    /// error every call fails with the same error.
    pub fn push<E: ParserEvents>(&mut self, data: &[u8], events: &mut E) -> Result<usize, ParseError> {
        if let State::Failed(err) = self.state {
            return Err(err);
        }

        let mut pos = 0;
        while pos < data.len() {
            let rest = &data[pos..];
            match self.state {
                State::Idle => {
                    pos += rest.iter().take_while(|b| matches!(b, b'\r' | b'\n')).count();
                    if pos < data.len() {
                        self.state = State::Head;
                        events.on_message_begin();
                    }
                }
                State::Head => {
                    let (used, done) = self.read_head(rest, events).map_err(|e| self.fail(e))?;
                    pos += used;
                    if done {
                        return Ok(pos);
                    }
                }
                State::Body(remaining) => {
                    let n = stream_body(remaining, rest, events);
                    pos += n;
                    if remaining == n as u64 {
                        self.state = State::Idle;
                        events.on_message_complete();
                        return Ok(pos);
                    }
                    self.state = State::Body(remaining - n as u64);
                }
                State::ChunkSize => {
                    let (used, done) = self.take_line(rest).map_err(|e| self.fail(e))?;
                    pos += used;
                    if done {
                        let size = match httparse::parse_chunk_size(&self.line) {
                            Ok(httparse::Status::Complete((_, size))) => size,
                            _ => return Err(self.fail(ParseError::InvalidChunk)),
                        };
                        self.line.clear();
                        self.state = if size == 0 {
                            State::Trailers
                        } else {
                            State::ChunkData(size)
                        };
                    }
                }
                State::ChunkData(remaining) => {
                    let n = stream_body(remaining, rest, events);
                    pos += n;
                    self.state = if remaining == n as u64 {
                        State::ChunkDataEnd
                    } else {
                        State::ChunkData(remaining - n as u64)
                    };
                }
                State::ChunkDataEnd => {
                    let (used, done) = self.take_line(rest).map_err(|e| self.fail(e))?;
                    pos += used;
                    if done {
                        if !is_blank_line(&self.line) {
                            return Err(self.fail(ParseError::InvalidChunk));
                        }
                        self.line.clear();
                        self.state = State::ChunkSize;
                    }
                }
                State::Trailers => {
                    let (used, done) = self.take_line(rest).map_err(|e| self.fail(e))?;
                    pos += used;
                    if done {
                        let blank = is_blank_line(&self.line);
                        self.line.clear();
                        if blank {
                            self.state = State::Idle;
                            events.on_message_complete();
                            return Ok(pos);
                        }
                    }
                }
                State::Failed(err) => return Err(err),
            }
        }

        Ok(pos)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed(_))
    }

    /// True between messages, i.e. nothing of the next message has arrived yet.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        self.state = State::Failed(err);
        err
    }

    /// Buffers head bytes until `httparse` sees the blank line, then emits the
    /// url/header/headers-complete events. Returns `(consumed, message_done)`.
    fn read_head<E: ParserEvents>(&mut self, rest: &[u8], events: &mut E) -> Result<(usize, bool), ParseError> {
        let max_head_size = self.limits.max_head_size;
        let buffered = self.head.len();
        self.head.extend_from_slice(rest);

        let (head_len, head, framing) = {
            let mut headers = vec![httparse::EMPTY_HEADER; self.limits.max_headers];
            let mut req = httparse::Request::new(&mut headers);
            let head_len = match req.parse(&self.head)? {
                httparse::Status::Complete(len) => len,
                httparse::Status::Partial => {
                    if self.head.len() > max_head_size {
                        return Err(ParseError::HeadTooLarge(max_head_size));
                    }
                    return Ok((rest.len(), false));
                }
            };
            if head_len > max_head_size {
                return Err(ParseError::HeadTooLarge(max_head_size));
            }

            let method = req
                .method
                .and_then(Method::from_str)
                .ok_or(ParseError::InvalidMethod)?;
            let http_minor = req.version.ok_or(ParseError::InvalidVersion)?;
            let framing = body_framing(req.headers)?;

            events.on_url(req.path.unwrap_or_default().as_bytes());
            for header in req.headers.iter() {
                events.on_header_field(header.name.as_bytes());
                events.on_header_value(header.value);
            }

            let head = ParsedHead {
                method,
                http_major: 1,
                http_minor,
            };
            (head_len, head, framing)
        };

        self.head.clear();
        let used = head_len.saturating_sub(buffered);

        if events.on_headers_complete(&head).is_break() {
            return Err(ParseError::Aborted);
        }

        match framing {
            Framing::Length(0) => {
                self.state = State::Idle;
                events.on_message_complete();
                Ok((used, true))
            }
            Framing::Length(len) => {
                self.state = State::Body(len);
                Ok((used, false))
            }
            Framing::Chunked => {
                self.state = State::ChunkSize;
                Ok((used, false))
            }
        }
    }

    /// Appends bytes up to and including the next `\n` to the line buffer.
    /// Returns `(consumed, line_complete)`.
    fn take_line(&mut self, rest: &[u8]) -> Result<(usize, bool), ParseError> {
        let (used, done) = match rest.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (rest.len(), false),
        };
        self.line.extend_from_slice(&rest[..used]);
        if self.line.len() > MAX_LINE_LEN {
            return Err(ParseError::InvalidChunk);
        }
        Ok((used, done))
    }
}

fn stream_body<E: ParserEvents>(remaining: u64, rest: &[u8], events: &mut E) -> usize {
    let n = remaining.min(rest.len() as u64) as usize;
    events.on_body(&rest[..n]);
    n
}

fn is_blank_line(line: &[u8]) -> bool {
    line == b"\r\n" || line == b"\n"
}

fn body_framing(headers: &[httparse::Header<'_>]) -> Result<Framing, ParseError> {
    let mut chunked = None;
    let mut length = None;

    for header in headers {
        if header.name.eq_ignore_ascii_case("transfer-encoding") {
            let value = std::str::from_utf8(header.value).map_err(|_| ParseError::InvalidHeader)?;
            let last = value.rsplit(',').next().unwrap_or_default().trim();
            chunked = Some(last.eq_ignore_ascii_case("chunked"));
        } else if header.name.eq_ignore_ascii_case("content-length") {
            let len = std::str::from_utf8(header.value)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .ok_or(ParseError::InvalidContentLength)?;
            if length.is_some_and(|prev| prev != len) {
                return Err(ParseError::InvalidContentLength);
            }
            length = Some(len);
        }
    }

    match chunked {
        Some(true) => Ok(Framing::Chunked),
        // A request body must end in chunked if it is transfer-coded at all.
        Some(false) => Err(ParseError::InvalidHeader),
        None => Ok(Framing::Length(length.unwrap_or(0))),
    }
}

/// Splits a raw request target into a field-presence table.
///
/// Handles origin-form (`/p?q#f`), asterisk-form (`*`), absolute-form
/// (`scheme://user@host:port/p?q#f`) and, when `is_connect` is set,
/// authority-form (`host:port`). Bracketed IPv6 hosts are recorded without
/// their brackets.
pub fn parse_url(buf: &[u8], is_connect: bool) -> Result<UrlFieldTable, ParseError> {
    if buf.is_empty() || buf.iter().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(ParseError::InvalidUrl);
    }

    let mut table = UrlFieldTable::new();

    if is_connect {
        parse_authority(buf, 0, buf.len(), &mut table)?;
        if table.has(UrlField::UserInfo) || !table.has(UrlField::Port) {
            return Err(ParseError::InvalidUrl);
        }
        return Ok(table);
    }

    let mut pos = 0;
    if buf[0] != b'/' && buf[0] != b'*' {
        let scheme_len = scheme_length(buf).ok_or(ParseError::InvalidUrl)?;
        table.set(UrlField::Scheme, 0, scheme_len);

        let start = scheme_len + 3;
        let end = buf[start..]
            .iter()
            .position(|b| matches!(b, b'/' | b'?' | b'#'))
            .map_or(buf.len(), |i| start + i);
        parse_authority(buf, start, end, &mut table)?;
        pos = end;
    }

    split_path(buf, pos, &mut table);
    Ok(table)
}

fn scheme_length(buf: &[u8]) -> Option<usize> {
    let sep = buf.windows(3).position(|w| w == b"://")?;
    let scheme = &buf[..sep];
    let first = *scheme.first()?;
    let valid = first.is_ascii_alphabetic()
        && scheme
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'));
    valid.then_some(sep)
}

fn parse_authority(buf: &[u8], start: usize, end: usize, table: &mut UrlFieldTable) -> Result<(), ParseError> {
    let authority = &buf[start..end];

    let host_start = match authority.iter().rposition(|&b| b == b'@') {
        Some(at) => {
            if at > 0 {
                table.set(UrlField::UserInfo, start, at);
            }
            start + at + 1
        }
        None => start,
    };

    let (host_off, host_len, port_start) = if buf.get(host_start) == Some(&b'[') {
        let close = buf[host_start..end]
            .iter()
            .position(|&b| b == b']')
            .map(|i| host_start + i)
            .ok_or(ParseError::InvalidUrl)?;
        let port_start = match buf.get(close + 1) {
            _ if close + 1 == end => None,
            Some(b':') => Some(close + 2),
            _ => return Err(ParseError::InvalidUrl),
        };
        (host_start + 1, close - host_start - 1, port_start)
    } else {
        let colon = buf[host_start..end]
            .iter()
            .position(|&b| b == b':')
            .map(|i| host_start + i);
        let host_end = colon.unwrap_or(end);
        (host_start, host_end - host_start, colon.map(|c| c + 1))
    };

    if host_len == 0 {
        return Err(ParseError::InvalidUrl);
    }
    table.set(UrlField::Host, host_off, host_len);

    if let Some(port_start) = port_start {
        let digits = &buf[port_start..end];
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(ParseError::InvalidUrl);
        }
        let port = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or(ParseError::InvalidUrl)?;
        table.set_port(port_start, digits.len(), port);
    }

    Ok(())
}

fn split_path(buf: &[u8], pos: usize, table: &mut UrlFieldTable) {
    let end = buf.len();
    let path_end = buf[pos..]
        .iter()
        .position(|b| matches!(b, b'?' | b'#'))
        .map_or(end, |i| pos + i);
    if path_end > pos {
        table.set(UrlField::Path, pos, path_end - pos);
    }

    let mut cursor = path_end;
    if buf.get(cursor) == Some(&b'?') {
        let query_start = cursor + 1;
        let query_end = buf[query_start..]
            .iter()
            .position(|&b| b == b'#')
            .map_or(end, |i| query_start + i);
        table.set(UrlField::Query, query_start, query_end - query_start);
        cursor = query_end;
    }
    if buf.get(cursor) == Some(&b'#') {
        table.set(UrlField::Fragment, cursor + 1, end - cursor - 1);
    }
}
