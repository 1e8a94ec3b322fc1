//! Error taxonomy for the connection core.

use thiserror::Error;

use crate::http::parser::ParseError;

/// Failures surfaced by a [`Connection`](crate::http::connection::Connection).
///
/// Protocol failures (`MalformedRequest`, `MalformedUrl`) are local to one
/// message: the in-flight request is failed and the transport is closed.
/// `TransmitAccounting` stops processing of the whole connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The parser rejected the byte stream mid-message.
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] ParseError),

    /// The request line was accepted but its target could not be split into URL fields.
    #[error("malformed request target: {0:?}")]
    MalformedUrl(String),

    /// The transport confirmed more bytes than were ever queued.
    #[error("transmit accounting violation: {confirmed} bytes confirmed, {outstanding} outstanding")]
    TransmitAccounting { confirmed: usize, outstanding: usize },

    /// The transport went away before the message completed.
    #[error("connection closed before the message completed")]
    ConnectionLost,
}
