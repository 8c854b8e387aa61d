//! Buffered byte cursor over an abstract duplex transport.
//!
//! The engine never opens sockets. It is handed a duplex byte channel
//! (anything implementing [`Transport`]) and layers a resizable pending
//! buffer on top of it:
//!
//! - byte-at-a-time reads ([`ByteCursor::read_byte`])
//! - non-consuming lookahead ([`ByteCursor::peek`])
//! - atomic writes ([`ByteCursor::write`]: one `write_all` + flush)
//!
//! One cursor is owned by exactly one connection and is only ever reached
//! through `&mut`, so the pending buffer needs no lock.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, WebSockError};

/// Initial capacity of the pending buffer.
pub const INITIAL_BUFFER_SIZE: usize = 8 * 1024;

/// Capacity reserved before each transport read.
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Abstract duplex byte channel consumed by the engine.
///
/// Blanket-implemented for every async read/write pair, including
/// `tokio::io::DuplexStream` used in tests.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Buffered reader/writer for one connection.
///
/// Incoming bytes accumulate in a `BytesMut` pending buffer; consuming
/// reads advance through it and the consumed prefix is reclaimed by
/// `split_to`. Unread bytes are never lost.
pub struct ByteCursor {
    io: Box<dyn Transport>,
    pending: BytesMut,
}

impl ByteCursor {
    /// Wrap a transport in a new cursor with an empty pending buffer.
    pub fn new(io: impl Transport + 'static) -> Self {
        Self {
            io: Box::new(io),
            pending: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
        }
    }

    /// Read a single byte, pulling from the transport while the buffer
    /// is empty.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the transport reports end-of-stream with no
    /// buffered bytes remaining; `Io` on transport error.
    pub async fn read_byte(&mut self) -> Result<u8> {
        while self.pending.is_empty() {
            self.fill().await?;
        }
        Ok(self.pending.get_u8())
    }

    /// Read exactly `n` bytes, filling from the transport as needed.
    ///
    /// Consumes exactly `n` bytes on success. An end-of-stream before `n`
    /// bytes are available fails with `ConnectionClosed` and leaves the
    /// already-buffered bytes in place.
    pub async fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        while self.pending.len() < n {
            self.fill().await?;
        }
        Ok(self.pending.split_to(n).freeze())
    }

    /// Report whether the buffered prefix matches `expected` without
    /// consuming anything.
    ///
    /// Fills from the transport only when the buffer is empty. Returns
    /// `false` when fewer than `expected.len()` bytes are buffered, so a
    /// caller using `peek` for detection must be prepared to ask again
    /// once more bytes arrive. Idempotent: repeated calls consume zero
    /// bytes and agree.
    pub async fn peek(&mut self, expected: &[u8]) -> Result<bool> {
        if self.pending.is_empty() {
            self.fill().await?;
        }
        if self.pending.len() < expected.len() {
            return Ok(false);
        }
        Ok(&self.pending[..expected.len()] == expected)
    }

    /// Append one transport read to the pending buffer.
    ///
    /// Returns the number of bytes read (always non-zero).
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` when the transport reports end-of-stream.
    pub async fn fill(&mut self) -> Result<usize> {
        self.pending.reserve(READ_CHUNK_SIZE);
        let n = self.io.read_buf(&mut self.pending).await?;
        if n == 0 {
            return Err(WebSockError::ConnectionClosed);
        }
        Ok(n)
    }

    /// Write `bytes` to the transport as a single atomic write and flush.
    ///
    /// The side effect is observable on the wire when this returns. Two
    /// concurrent writers on the same connection must be serialized by the
    /// caller; the cursor does not queue or merge writes.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.io.write_all(bytes).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }

    /// Number of buffered, unread bytes.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Check whether any unread bytes are buffered.
    #[inline]
    pub fn has_buffered(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl std::fmt::Debug for ByteCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteCursor")
            .field("buffered", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_read_byte_sequence() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut cursor = ByteCursor::new(local);

        remote.write_all(b"abc").await.unwrap();

        assert_eq!(cursor.read_byte().await.unwrap(), b'a');
        assert_eq!(cursor.read_byte().await.unwrap(), b'b');
        assert_eq!(cursor.read_byte().await.unwrap(), b'c');
    }

    #[tokio::test]
    async fn test_read_byte_eof_is_connection_closed() {
        let (local, remote) = tokio::io::duplex(64);
        let mut cursor = ByteCursor::new(local);
        drop(remote);

        match cursor.read_byte().await {
            Err(WebSockError::ConnectionClosed) => {}
            other => panic!("expected ConnectionClosed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_read_bytes_spans_multiple_fills() {
        // Tiny duplex capacity forces several transport reads.
        let (local, mut remote) = tokio::io::duplex(4);
        let mut cursor = ByteCursor::new(local);

        let payload = b"0123456789".to_vec();
        let writer = tokio::spawn(async move {
            remote.write_all(&payload).await.unwrap();
            remote
        });

        let got = cursor.read_bytes(10).await.unwrap();
        assert_eq!(&got[..], b"0123456789");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_peek_is_idempotent_and_non_consuming() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut cursor = ByteCursor::new(local);

        remote.write_all(&[0x00, 0x41]).await.unwrap();

        for _ in 0..3 {
            assert!(cursor.peek(&[0x00]).await.unwrap());
            assert!(!cursor.peek(&[0xFF]).await.unwrap());
        }
        assert_eq!(cursor.buffered(), 2);
        assert_eq!(cursor.read_byte().await.unwrap(), 0x00);
    }

    #[tokio::test]
    async fn test_peek_short_buffer_is_false_not_error() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut cursor = ByteCursor::new(local);

        remote.write_all(&[0xFF]).await.unwrap();

        // Prefix matches but is shorter than expected: no match, nothing
        // consumed, caller retries once more bytes arrive.
        assert!(!cursor.peek(&[0xFF, 0x00]).await.unwrap());
        assert_eq!(cursor.buffered(), 1);

        remote.write_all(&[0x00]).await.unwrap();
        cursor.fill().await.unwrap();
        assert!(cursor.peek(&[0xFF, 0x00]).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_is_observable_immediately() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut cursor = ByteCursor::new(local);

        cursor.write(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        use tokio::io::AsyncReadExt;
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_fill_eof_preserves_buffered_bytes() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut cursor = ByteCursor::new(local);

        remote.write_all(&[0x80, 0x03]).await.unwrap();
        cursor.fill().await.unwrap();
        drop(remote);

        assert!(matches!(
            cursor.fill().await,
            Err(WebSockError::ConnectionClosed)
        ));
        assert_eq!(cursor.buffered(), 2);
    }
}
