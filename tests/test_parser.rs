use std::ops::ControlFlow;

use tether::http::parser::{HttpParser, ParseError, ParsedHead, ParserEvents, ParserLimits};
use tether::http::request::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Begin,
    Url(String),
    Field(String),
    Value(String),
    HeadersComplete(ParsedHead),
    Body(String),
    Complete,
}

#[derive(Default)]
struct Events {
    seen: Vec<Event>,
    stop_at_headers: bool,
}

impl Events {
    /// Body chunks glued together, ignoring how the input was split.
    fn body(&self) -> String {
        self.seen
            .iter()
            .filter_map(|e| match e {
                Event::Body(chunk) => Some(chunk.as_str()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, event: &Event) -> usize {
        self.seen.iter().filter(|e| *e == event).count()
    }
}

impl ParserEvents for Events {
    fn on_message_begin(&mut self) {
        self.seen.push(Event::Begin);
    }

    fn on_url(&mut self, chunk: &[u8]) {
        self.seen.push(Event::Url(String::from_utf8_lossy(chunk).into_owned()));
    }

    fn on_header_field(&mut self, chunk: &[u8]) {
        self.seen.push(Event::Field(String::from_utf8_lossy(chunk).into_owned()));
    }

    fn on_header_value(&mut self, chunk: &[u8]) {
        self.seen.push(Event::Value(String::from_utf8_lossy(chunk).into_owned()));
    }

    fn on_headers_complete(&mut self, head: &ParsedHead) -> ControlFlow<()> {
        self.seen.push(Event::HeadersComplete(*head));
        if self.stop_at_headers {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn on_body(&mut self, chunk: &[u8]) {
        self.seen.push(Event::Body(String::from_utf8_lossy(chunk).into_owned()));
    }

    fn on_message_complete(&mut self) {
        self.seen.push(Event::Complete);
    }
}

fn parser() -> HttpParser {
    HttpParser::new(ParserLimits::default())
}

fn head(method: Method, http_minor: u8) -> Event {
    Event::HeadersComplete(ParsedHead {
        method,
        http_major: 1,
        http_minor,
    })
}

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let mut events = Events::default();
    let consumed = parser().push(req, &mut events).unwrap();

    assert_eq!(consumed, req.len());
    assert_eq!(
        events.seen,
        vec![
            Event::Begin,
            Event::Url("/".into()),
            Event::Field("Host".into()),
            Event::Value("example.com".into()),
            head(Method::GET, 1),
            Event::Complete,
        ]
    );
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let mut parser = parser();
    let mut events = Events::default();
    let consumed = parser.push(req, &mut events).unwrap();

    assert_eq!(consumed, req.len());
    assert!(events.seen.contains(&head(Method::POST, 1)));
    assert_eq!(events.body(), "hello");
    assert_eq!(events.seen.last(), Some(&Event::Complete));
    assert!(parser.is_idle());
}

#[test]
fn test_chunked_body_fed_byte_by_byte() {
    let req = b"POST /up HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\nX-Trailer: t\r\n\r\n";
    let mut parser = parser();
    let mut events = Events::default();

    for byte in req.iter() {
        let consumed = parser.push(std::slice::from_ref(byte), &mut events).unwrap();
        assert_eq!(consumed, 1);
    }

    assert_eq!(events.body(), "Wikipedia");
    assert_eq!(events.count(&Event::Begin), 1);
    assert_eq!(events.count(&Event::Complete), 1);
    assert_eq!(events.seen.last(), Some(&Event::Complete));
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    let mut parser = parser();
    let mut events = Events::default();

    assert_eq!(parser.push(req, &mut events), Ok(req.len()));
    assert_eq!(events.seen, vec![Event::Begin]);
    assert!(!parser.is_idle());

    parser.push(b"\r\n", &mut events).unwrap();
    assert_eq!(events.seen.last(), Some(&Event::Complete));
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let mut parser = parser();
    let mut events = Events::default();

    parser
        .push(b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello", &mut events)
        .unwrap();
    assert_eq!(events.body(), "hello");
    assert_eq!(events.count(&Event::Complete), 0);

    parser.push(b"world", &mut events).unwrap();
    assert_eq!(events.body(), "helloworld");
    assert_eq!(events.count(&Event::Complete), 1);
}

#[test]
fn test_parse_invalid_http_method() {
    let mut parser = parser();
    let mut events = Events::default();

    let result = parser.push(b"INVALID / HTTP/1.1\r\n\r\n", &mut events);

    assert_eq!(result, Err(ParseError::InvalidMethod));
    assert!(parser.is_failed());
    // Once failed, every later push reports the same error.
    assert_eq!(parser.push(b"GET / HTTP/1.1\r\n\r\n", &mut events), Err(ParseError::InvalidMethod));
}

#[test]
fn test_parse_malformed_header() {
    let result = parser().push(b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n", &mut Events::default());

    assert_eq!(result, Err(ParseError::InvalidHeader));
}

#[test]
fn test_parse_various_http_methods() {
    for (text, method) in [
        ("GET", Method::GET),
        ("HEAD", Method::HEAD),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
        ("OPTIONS", Method::OPTIONS),
        ("TRACE", Method::TRACE),
        ("PATCH", Method::PATCH),
    ] {
        let req = format!("{text} /r HTTP/1.1\r\n\r\n");
        let mut events = Events::default();
        parser().push(req.as_bytes(), &mut events).unwrap();
        assert!(events.seen.contains(&head(method, 1)), "{text}");
    }
}

#[test]
fn test_head_too_large() {
    let mut parser = HttpParser::new(ParserLimits {
        max_head_size: 32,
        max_headers: 8,
    });
    let result = parser.push(b"GET /a-rather-long-path HTTP/1.1\r\nHost: x", &mut Events::default());

    assert_eq!(result, Err(ParseError::HeadTooLarge(32)));
}

#[test]
fn test_too_many_headers() {
    let mut parser = HttpParser::new(ParserLimits {
        max_head_size: 1024,
        max_headers: 1,
    });
    let result = parser.push(b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\n\r\n", &mut Events::default());

    assert_eq!(result, Err(ParseError::TooManyHeaders));
}

#[test]
fn test_invalid_content_length() {
    let result = parser().push(
        b"POST / HTTP/1.1\r\nContent-Length: five\r\n\r\n",
        &mut Events::default(),
    );
    assert_eq!(result, Err(ParseError::InvalidContentLength));
}

#[test]
fn test_pipelined_messages_stop_after_first() {
    let first = b"GET /one HTTP/1.1\r\n\r\n".as_slice();
    let both = [first, b"GET /two HTTP/1.1\r\n\r\n"].concat();
    let mut parser = parser();
    let mut events = Events::default();

    let consumed = parser.push(&both, &mut events).unwrap();
    assert_eq!(consumed, first.len());
    assert_eq!(events.count(&Event::Complete), 1);

    let rest = parser.push(&both[consumed..], &mut events).unwrap();
    assert_eq!(consumed + rest, both.len());
    assert_eq!(events.count(&Event::Complete), 2);
    assert!(events.seen.contains(&Event::Url("/two".into())));
}

#[test]
fn test_leading_blank_lines_are_skipped() {
    let mut events = Events::default();
    parser()
        .push(b"\r\n\r\nGET / HTTP/1.1\r\n\r\n", &mut events)
        .unwrap();

    assert_eq!(events.seen.first(), Some(&Event::Begin));
    assert_eq!(events.count(&Event::Begin), 1);

    let mut idle = Events::default();
    let mut parser = parser();
    assert_eq!(parser.push(b"\r\n", &mut idle), Ok(2));
    assert!(idle.seen.is_empty());
    assert!(parser.is_idle());
}

#[test]
fn test_http10_version() {
    let mut events = Events::default();
    parser().push(b"GET / HTTP/1.0\r\n\r\n", &mut events).unwrap();

    assert!(events.seen.contains(&head(Method::GET, 0)));
}

#[test]
fn test_handler_can_abort_at_headers() {
    let mut parser = parser();
    let mut events = Events {
        stop_at_headers: true,
        ..Default::default()
    };

    let result = parser.push(b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc", &mut events);

    assert_eq!(result, Err(ParseError::Aborted));
    assert_eq!(events.body(), "");
    assert!(parser.is_failed());
}

#[test]
fn test_bad_chunk_size() {
    let result = parser().push(
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nxyz\r\n",
        &mut Events::default(),
    );
    assert_eq!(result, Err(ParseError::InvalidChunk));
}
