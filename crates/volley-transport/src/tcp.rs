//! TCP transport implementation using `tokio::net`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A newline-framed TCP connection.
///
/// The stream is split into halves so a reader parked in [`recv`] never
/// blocks a concurrent [`send`]. Each half sits behind its own async
/// mutex, which also serializes writes coming from different tasks.
///
/// [`recv`]: Connection::recv
/// [`send`]: Connection::send
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    /// `None` once [`Connection::close`] has run.
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl TcpConnection {
    /// Opens a TCP stream to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port)).await.map_err(|source| {
            TransportError::ConnectFailed {
                host: host.to_string(),
                port,
                source,
            }
        })?;
        Self::from_stream(stream).map_err(|source| {
            TransportError::ConnectFailed {
                host: host.to_string(),
                port,
                source,
            }
        })
    }

    /// Wraps an already-established stream.
    pub fn from_stream(stream: TcpStream) -> std::io::Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "opened TCP connection");

        Ok(Self {
            id,
            peer,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(Some(write_half)),
        })
    }

    /// Returns the remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, line: &str) -> Result<(), Self::Error> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| {
            TransportError::ConnectionClosed(format!("{} is closed", self.id))
        })?;

        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');

        writer
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        let mut buf = Vec::new();
        let read = self
            .reader
            .lock()
            .await
            .read_until(b'\n', &mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if read == 0 {
            return Ok(None);
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        // A stray invalid byte should cost one entry, not the connection.
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        tracing::debug!(id = %self.id, "closing TCP connection");
        writer.shutdown().await.map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
