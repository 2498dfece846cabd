//! TCP connection management with line-delimited I/O.
//!
//! MMP is a CRLF-delimited text protocol over TCP. This module wraps
//! tokio's TCP stream with buffered reading and writing of complete lines.
//! The [`Transport`] trait abstracts line I/O, allowing channel-based mocks
//! for deterministic testing.

use async_trait::async_trait;

use super::error::{MmpError, MmpResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Line-level I/O for the MMP protocol.
///
/// Abstracts reading and writing wire lines so the client can run over TCP
/// (production) or channels (tests). Lines cross this boundary without
/// their CRLF delimiter.
#[async_trait]
pub trait Transport: Send {
    /// Read one line, delimiter stripped.
    ///
    /// Returns `None` on clean connection close (EOF). Empty lines are
    /// delivered as-is; the dispatcher ignores them.
    async fn read_line(&mut self) -> MmpResult<Option<String>>;

    /// Write one line, appending the CRLF delimiter.
    async fn write_line(&mut self, line: &str) -> MmpResult<()>;
}

/// Buffered TCP connection for the MMP protocol.
pub struct Connection {
    /// Buffered reader for incoming lines
    reader: BufReader<OwnedReadHalf>,

    /// Buffered writer for outgoing lines
    writer: BufWriter<OwnedWriteHalf>,

    /// Reusable line buffer
    line_buf: String,
}

impl Connection {
    /// Create a new connection from a TCP stream.
    pub fn new(stream: TcpStream) -> Self {
        // Split the stream for independent reading and writing
        let (read_half, write_half) = stream.into_split();

        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            line_buf: String::with_capacity(256),
        }
    }

    /// Connect to an MMP server at `host:port`.
    pub async fn connect(addr: &str) -> MmpResult<Self> {
        debug!(addr = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| MmpError::ConnectionFailed(e.to_string()))?;

        debug!("Connected to server");

        Ok(Self::new(stream))
    }
}

#[async_trait]
impl Transport for Connection {
    async fn read_line(&mut self) -> MmpResult<Option<String>> {
        self.line_buf.clear();

        let n = self
            .reader
            .read_line(&mut self.line_buf)
            .await
            .map_err(MmpError::Io)?;

        if n == 0 {
            // EOF - connection closed
            return Ok(None);
        }

        let line = self.line_buf.trim_end_matches(['\r', '\n']);
        trace!(rx = %line, "Received line");

        Ok(Some(line.to_string()))
    }

    async fn write_line(&mut self, line: &str) -> MmpResult<()> {
        trace!(tx = %line, "Sending line");

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;

        Ok(())
    }
}

/// Channel-based transport for deterministic testing.
///
/// Backed by tokio mpsc channels rather than TCP, so it works with
/// `tokio::time::pause()` without triggering auto-advance on real I/O.
/// Create a pair with [`MockTransport::pair()`]; the transport is the
/// client's side, the handle is the test's side.
#[cfg(test)]
pub(crate) struct MockTransport {
    rx: tokio::sync::mpsc::UnboundedReceiver<String>,
    tx: tokio::sync::mpsc::UnboundedSender<String>,
}

/// Test-side handle for a [`MockTransport`].
///
/// Use `send()` to feed lines to the client and `recv()` to read lines the
/// client wrote.
#[cfg(test)]
pub(crate) struct MockTransportHandle {
    tx: tokio::sync::mpsc::UnboundedSender<String>,
    rx: tokio::sync::mpsc::UnboundedReceiver<String>,
}

#[cfg(test)]
impl MockTransport {
    /// Create a linked (transport, handle) pair.
    pub fn pair() -> (Self, MockTransportHandle) {
        let (client_tx, handle_rx) = tokio::sync::mpsc::unbounded_channel();
        let (handle_tx, client_rx) = tokio::sync::mpsc::unbounded_channel();

        let transport = MockTransport {
            rx: client_rx,
            tx: client_tx,
        };
        let handle = MockTransportHandle {
            tx: handle_tx,
            rx: handle_rx,
        };
        (transport, handle)
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for MockTransport {
    async fn read_line(&mut self) -> MmpResult<Option<String>> {
        Ok(self.rx.recv().await)
    }

    async fn write_line(&mut self, line: &str) -> MmpResult<()> {
        self.tx
            .send(line.to_string())
            .map_err(|_| MmpError::Disconnected)
    }
}

#[cfg(test)]
impl MockTransportHandle {
    /// Send a line to the client.
    pub fn send(&self, line: &str) {
        self.tx.send(line.to_string()).expect("transport dropped");
    }

    /// Receive a line the client wrote.
    pub async fn recv(&mut self) -> String {
        self.rx.recv().await.expect("transport dropped")
    }
}
