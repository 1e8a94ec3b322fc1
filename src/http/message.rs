//! Per-message request assembly.

use std::net::SocketAddr;

use crate::error::HttpError;
use crate::http::headers::HeaderAccumulator;
use crate::http::parser::{ParsedHead, parse_url};
use crate::http::request::{Method, Request, RequestSink};
use crate::http::url::RequestUrl;

/// Progress of one message through the parser events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePhase {
    Begin,
    UrlAccumulation,
    HeaderAccumulation,
    HeadersComplete,
    BodyStreaming,
    MessageComplete,
}

/// Collects the url and header chunks of one message and builds the
/// [`Request`] at headers-complete.
///
/// The builder is reset at every message-begin; nothing carries over from
/// the previous message.
#[derive(Debug)]
pub struct RequestBuilder {
    phase: MessagePhase,
    url: Vec<u8>,
    headers: HeaderAccumulator,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            phase: MessagePhase::Begin,
            url: Vec::with_capacity(128),
            headers: HeaderAccumulator::new(),
        }
    }

    /// Readies the builder for the next message, keeping its buffers.
    pub fn reset(&mut self) {
        self.phase = MessagePhase::Begin;
        self.url.clear();
        self.headers.reset();
    }

    pub fn phase(&self) -> MessagePhase {
        self.phase
    }

    pub fn push_url(&mut self, chunk: &[u8]) {
        self.phase = MessagePhase::UrlAccumulation;
        self.url.extend_from_slice(chunk);
    }

    pub fn header_field(&mut self, chunk: &[u8]) {
        self.phase = MessagePhase::HeaderAccumulation;
        self.headers.on_field(chunk);
    }

    pub fn header_value(&mut self, chunk: &[u8]) {
        self.phase = MessagePhase::HeaderAccumulation;
        self.headers.on_value(chunk);
    }

    /// Finalizes the head into a [`Request`] and the sink for its body.
    ///
    /// Fails with [`HttpError::MalformedUrl`] when the accumulated target
    /// cannot be split into URL fields.
    pub fn complete_headers(
        &mut self,
        head: &ParsedHead,
        peer: SocketAddr,
    ) -> Result<(Request, RequestSink), HttpError> {
        self.phase = MessagePhase::HeadersComplete;

        let table = parse_url(&self.url, head.method == Method::CONNECT)
            .map_err(|_| HttpError::MalformedUrl(String::from_utf8_lossy(&self.url).into_owned()))?;
        let url = RequestUrl::from_fields(&self.url, &table);
        let headers = self.headers.finish();
        let version = format!("{}.{}", head.http_major, head.http_minor);

        Ok(Request::channel(head.method, version, url, headers, peer))
    }

    pub fn body_chunk(&mut self) {
        self.phase = MessagePhase::BodyStreaming;
    }

    pub fn complete_message(&mut self) {
        self.phase = MessagePhase::MessageComplete;
    }
}
