//! Framed connection over a byte stream.
//!
//! Every message has a fixed size, so a frame is exactly `M::SIZE` bytes:
//! no length prefix, no delimiter. Reads are bounded by a receive
//! deadline; writes go out one message at a time and are flushed
//! immediately so nothing is batched.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use super::protocol::{ProtocolError, WireMessage};

/// Why a connection stopped being usable.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Peer disconnected mid-read or mid-write.
    #[error("peer closed the connection")]
    Closed,

    /// No complete frame within the receive deadline.
    #[error("no data within {0:?}")]
    Timeout(Duration),

    /// Other socket failure.
    #[error("i/o error: {0}")]
    Io(#[source] io::Error),

    /// Frame arrived but failed validation.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ConnectionError {
    /// Decode-time violation, as opposed to a transport failure.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, ConnectionError::Protocol(_))
    }
}

impl From<io::Error> for ConnectionError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => ConnectionError::Closed,
            _ => ConnectionError::Io(e),
        }
    }
}

/// A stream that reads and writes whole protocol messages.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    recv_timeout: Duration,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream; every `recv` waits at most `recv_timeout`.
    pub fn new(stream: S, recv_timeout: Duration) -> Self {
        Self {
            stream,
            recv_timeout,
        }
    }

    /// Read exactly one `M` and validate it.
    pub async fn recv<M: WireMessage>(&mut self) -> Result<M, ConnectionError> {
        let mut buf = vec![0u8; M::SIZE];

        match timeout(self.recv_timeout, self.stream.read_exact(&mut buf)).await {
            Err(_) => return Err(ConnectionError::Timeout(self.recv_timeout)),
            Ok(result) => {
                result?;
            }
        }

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(frame = %hex::encode(&buf), "recv");

        Ok(M::decode(&buf)?)
    }

    /// Write one message and flush it.
    pub async fn send<M: WireMessage>(&mut self, message: &M) -> Result<(), ConnectionError> {
        let frame = message.encode();

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(frame = %hex::encode(&frame), "send");

        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Close the write half. Errors are ignored: the peer may already be gone.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
