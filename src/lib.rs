//! Tether - HTTP/1.x connection coordinator
//!
//! Bridges a raw byte stream to request/response exchanges: incremental
//! parsing, header and URL assembly, write accounting and keep-alive.

pub mod config;
pub mod error;
pub mod http;
pub mod server;
