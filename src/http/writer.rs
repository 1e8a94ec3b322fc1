use crate::http::headers::HeaderMap;
use crate::http::response::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Terminating chunk of a chunked body (no trailers).
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Serializes the status line and headers, including the blank separator line.
pub fn serialize_head(status: StatusCode, headers: &HeaderMap) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        status.as_u16(),
        status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in headers.iter() {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Frames `data` as one chunk of a chunked body.
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 12);
    buf.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    buf
}

/// A complete reply the connection sends on its own, e.g. for a request it
/// could not parse. Always marked `Connection: close`.
pub fn error_reply(status: StatusCode) -> Vec<u8> {
    let body = format!("{} {}\n", status.as_u16(), status.reason_phrase());

    let mut headers = HeaderMap::new();
    headers.insert("Content-Type", "text/plain");
    headers.insert("Content-Length", body.len().to_string());
    headers.insert("Connection", "close");

    let mut buf = serialize_head(status, &headers);
    buf.extend_from_slice(body.as_bytes());
    buf
}
