//! Tokio socket driver for [`Connection`].
//!
//! Turns socket activity into the connection's events: bytes read become
//! `on_readable`, bytes the socket accepted become `on_bytes_written`, EOF or
//! an IO error becomes `on_disconnected`. Commands from responses are applied
//! on the same task, so every state change of one connection happens on one
//! logical thread.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::Config;
use crate::http::connection::{Connection, ConnectionState, RequestHandler, Transport};
use crate::http::request::BodyBacklog;

/// In-memory buffers between a [`Connection`] and a socket.
#[derive(Debug)]
pub struct TcpTransport {
    peer: SocketAddr,
    inbound: BytesMut,
    outbound: BytesMut,
    flush_requested: bool,
    close_requested: bool,
}

impl TcpTransport {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
            flush_requested: false,
            close_requested: false,
        }
    }

    /// Stores bytes read from the socket.
    pub fn receive(&mut self, data: &[u8]) {
        self.inbound.extend_from_slice(data);
    }

    /// Takes everything queued for the socket.
    pub fn take_outbound(&mut self) -> Option<Bytes> {
        if self.outbound.is_empty() {
            return None;
        }
        Some(self.outbound.split().freeze())
    }

    pub fn take_flush_request(&mut self) -> bool {
        std::mem::take(&mut self.flush_requested)
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }
}

impl Transport for TcpTransport {
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
        self.outbound.extend_from_slice(data);
    }

    fn flush(&mut self) {
        self.flush_requested = true;
    }

    fn close(&mut self) {
        self.close_requested = true;
    }
}

/// Runs one client connection until it can be released.
pub async fn serve_connection<H: RequestHandler>(
    id: u64,
    stream: TcpStream,
    handler: H,
    cfg: &Config,
) -> anyhow::Result<()> {
    let peer = stream.peer_addr()?;
    let (mut reader, mut writer) = stream.into_split();
    let (mut conn, mut commands) =
        Connection::new(id, TcpTransport::new(peer), handler, cfg.parser_limits());
    let mut buf = vec![0u8; cfg.read_buffer_size.max(1)];

    loop {
        while let Some(chunk) = conn.transport_mut().take_outbound() {
            if conn.state() == ConnectionState::Disconnected {
                break;
            }
            if let Err(e) = writer.write_all(&chunk).await {
                debug!(connection = id, error = %e, "write failed");
                conn.on_disconnected();
                break;
            }
            conn.on_bytes_written(chunk.len())?;
        }

        if conn.transport_mut().take_flush_request() && conn.state() != ConnectionState::Disconnected {
            if let Err(e) = writer.flush().await {
                debug!(connection = id, error = %e, "flush failed");
                conn.on_disconnected();
            }
        }

        if conn.state() == ConnectionState::Closing && conn.transport().close_requested() {
            let _ = writer.shutdown().await;
            conn.on_disconnected();
        }

        if conn.is_releasable() {
            break;
        }

        // Reads pause while held input or unconsumed body is at its cap.
        let reading = conn.wants_read();
        let paused = conn.state() == ConnectionState::Open && !reading;
        let body = conn.body_backlog();
        tokio::select! {
            res = reader.read(&mut buf), if reading => match res {
                Ok(0) => conn.on_disconnected(),
                Ok(n) => {
                    conn.transport_mut().receive(&buf[..n]);
                    conn.on_readable();
                }
                Err(e) => {
                    debug!(connection = id, error = %e, "read failed");
                    conn.on_disconnected();
                }
            },
            Some(command) = commands.recv() => conn.apply(command),
            _ = body_taken(body), if paused => conn.on_readable(),
            else => break,
        }
    }

    debug!(connection = id, peer = %peer, "Connection released");
    Ok(())
}

async fn body_taken(body: Option<Arc<BodyBacklog>>) {
    match body {
        Some(body) => body.taken().await,
        None => std::future::pending().await,
    }
}
