//! Error types for websock-core.

use thiserror::Error;

/// Main error type for all protocol engine operations.
#[derive(Debug, Error)]
pub enum WebSockError {
    /// Transport-level I/O failure during read/write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP Upgrade handshake was rejected (missing/malformed required
    /// header, or accept-key mismatch). Terminal for the connection attempt.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Peer closed or half-closed the connection while bytes were expected.
    #[error("connection closed")]
    ConnectionClosed,

    /// A recognized frame type began decoding but hit an internal
    /// inconsistency (e.g. declared length exceeds the sane bound).
    /// Terminal for the connection; the stream is not resynchronized.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Engine misuse (encoding an unregistered frame tag, responding
    /// before validation, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using WebSockError.
pub type Result<T> = std::result::Result<T, WebSockError>;
