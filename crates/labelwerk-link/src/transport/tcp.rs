// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP printer link (ZPL over port 6101).
//
// The simplest possible print path: open a TCP socket and dump bytes. The
// printer must interpret the payload natively; there is no negotiation and
// no job tracking. The same socket answers the identity handshake for the
// info and connectivity commands.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use labelwerk_core::{LabelwerkError, LinkConfig, Result};

use super::Transport;

/// Chunk size for payload writes.
const WRITE_CHUNK: usize = 8192;

#[derive(Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    io_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Build an unopened link; `open` performs the connect.
    pub fn new(host: String, port: u16, config: &LinkConfig) -> Self {
        Self {
            host,
            port,
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
            stream: None,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| LabelwerkError::Connection("TCP link not open".into()))
    }
}

impl Transport for TcpTransport {
    fn open(&mut self) -> Result<()> {
        let endpoint = self.endpoint();
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| LabelwerkError::Connection(format!("resolve {endpoint}: {e}")))?
            .next()
            .ok_or_else(|| {
                LabelwerkError::Connection(format!("no address resolved for {endpoint}"))
            })?;

        info!(addr = %endpoint, "opening raw TCP link");
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| LabelwerkError::Connection(format!("TCP connect to {endpoint}: {e}")))?;
        stream
            .set_read_timeout(Some(self.io_timeout))
            .map_err(|e| LabelwerkError::Connection(format!("set read timeout: {e}")))?;
        stream
            .set_write_timeout(Some(self.io_timeout))
            .map_err(|e| LabelwerkError::Connection(format!("set write timeout: {e}")))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        let total = payload.len();
        let stream = self.stream()?;

        let mut sent = 0usize;
        for chunk in payload.chunks(WRITE_CHUNK) {
            stream.write_all(chunk).map_err(|e| {
                LabelwerkError::TransportWrite(format!("TCP send failed at byte {sent}: {e}"))
            })?;
            sent += chunk.len();
            debug!(sent, total, "raw TCP progress");
        }
        stream
            .flush()
            .map_err(|e| LabelwerkError::TransportWrite(format!("TCP flush: {e}")))?;

        info!(total, "raw TCP payload sent");
        Ok(())
    }

    fn exchange(&mut self, probe: &[u8], max_reply: usize) -> Result<Vec<u8>> {
        let endpoint = self.endpoint();
        let stream = self.stream()?;

        stream
            .write_all(probe)
            .map_err(|e| LabelwerkError::Connection(format!("handshake probe to {endpoint}: {e}")))?;
        stream
            .flush()
            .map_err(|e| LabelwerkError::Connection(format!("handshake flush: {e}")))?;

        let mut reply = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    reply.extend_from_slice(&buf[..n]);
                    if reply.len() >= max_reply || reply_terminated(&reply) {
                        break;
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    // A timeout after the first bytes means the printer has
                    // said all it is going to say.
                    if reply.is_empty() {
                        return Err(LabelwerkError::Connection(format!(
                            "handshake read from {endpoint} timed out"
                        )));
                    }
                    break;
                }
                Err(e) => {
                    return Err(LabelwerkError::Connection(format!(
                        "handshake read from {endpoint}: {e}"
                    )));
                }
            }
        }

        debug!(bytes = reply.len(), "handshake reply received");
        Ok(reply)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!(addr = %self.endpoint(), "raw TCP link closed");
        }
    }
}

/// A handshake reply ends at the first blank line: two newlines with nothing
/// but carriage returns between them.
fn reply_terminated(reply: &[u8]) -> bool {
    let mut newlines = 0u8;
    for &byte in reply {
        match byte {
            b'\n' => {
                newlines += 1;
                if newlines == 2 {
                    return true;
                }
            }
            b'\r' => {}
            _ => newlines = 0,
        }
    }
    false
}
