//! TCP transport
//!
//! Reference transport: newline-delimited JSON frames over a `TcpStream`,
//! with a reader thread relaying inbound lines to the owner. Embedders with a
//! WebSocket (or other) channel implement `Connector` themselves.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, TelemetryError};

use super::transport::{Connection, Connector, TransportEvents};

/// Connects to a line-delimited JSON collector endpoint
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// `addr` is a `host:port` pair
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Connector for TcpConnector {
    fn connect(&self, events: Arc<dyn TransportEvents>) -> Result<Box<dyn Connection>> {
        let stream = TcpStream::connect(&self.addr)
            .map_err(|e| TelemetryError::Transport(format!("connect {}: {e}", self.addr)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TelemetryError::Transport(format!("set_nodelay: {e}")))?;
        let reader_stream = stream
            .try_clone()
            .map_err(|e| TelemetryError::Transport(format!("clone stream: {e}")))?;

        let open = Arc::new(AtomicBool::new(true));
        let reader_open = Arc::clone(&open);
        std::thread::Builder::new()
            .name("perfstream-tcp-reader".to_string())
            .spawn(move || {
                events.on_open();
                let reader = BufReader::new(reader_stream);
                for line in reader.lines() {
                    match line {
                        Ok(line) if !line.is_empty() => events.on_message(&line),
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(err = %e, "tcp transport read failed");
                            break;
                        }
                    }
                }
                reader_open.store(false, Ordering::SeqCst);
                events.on_close();
            })
            .map_err(|e| TelemetryError::Transport(format!("spawn reader: {e}")))?;

        Ok(Box::new(TcpConnection { stream, open }))
    }
}

struct TcpConnection {
    stream: TcpStream,
    open: Arc<AtomicBool>,
}

impl Connection for TcpConnection {
    fn send(&mut self, data: &str) -> Result<()> {
        self.stream
            .write_all(data.as_bytes())
            .and_then(|_| self.stream.write_all(b"\n"))
            .map_err(|e| {
                self.open.store(false, Ordering::SeqCst);
                TelemetryError::Transport(format!("send: {e}"))
            })
    }

    fn close(&mut self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}
