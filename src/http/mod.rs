//! HTTP/1.x connection handling.
//!
//! This module turns a raw byte stream into request/response exchanges, one
//! at a time per connection.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: The per-connection coordinator: feeds the parser, tracks written bytes, applies keep-alive
//! - **`parser`**: Push-based request parser and request-target splitter
//! - **`message`**: Per-message state machine that assembles a `Request`
//! - **`headers`**: Ordered header map and the incremental header accumulator
//! - **`url`**: Structured request target rebuilt from the parser's field table
//! - **`request`**: HTTP request representation and its streamed body events
//! - **`response`**: Outbound response handle and the keep-alive rule
//! - **`writer`**: Serializes response heads, chunks and error replies
//! - **`io`**: Drives a `Connection` from a tokio `TcpStream`
//!
//! # Message State Machine
//!
//! Each message on a connection goes through:
//!
//! ```text
//!        ┌─────────────┐
//!        │    Begin    │ ← first byte of a new message
//!        └──────┬──────┘
//!               ▼
//!        ┌──────────────────┐
//!        │ UrlAccumulation  │ ← request target chunks
//!        └──────┬───────────┘
//!               ▼
//!        ┌────────────────────┐
//!        │ HeaderAccumulation │ ← field/value chunks
//!        └──────┬─────────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │ HeadersComplete  │ → (Request, Response) handed to the application
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │  BodyStreaming   │ → body chunks forwarded as they arrive
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │ MessageComplete  │
//!        └──────┬───────────┘
//!               │ Response done
//!               ├─ Keep-Alive → Begin (same connection)
//!               └─ Last → connection closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tether::config::Config;
//! use tether::http::io::serve_connection;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = Config::default();
//!     let listener = TcpListener::bind(&cfg.listen_addr).await?;
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let cfg = cfg.clone();
//!         tokio::spawn(async move {
//!             let handler = |_req, resp: tether::http::response::Response| resp.end("hi\n");
//!             if let Err(e) = serve_connection(0, socket, handler, &cfg).await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod headers;
pub mod io;
pub mod message;
pub mod parser;
pub mod request;
pub mod response;
pub mod url;
pub mod writer;
