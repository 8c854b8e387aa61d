//! Callback surface exposed to the host application.
//!
//! A [`SocketListener`] receives the frames decoded on one connection, in
//! strict arrival order, from that connection's read loop. All methods
//! default to no-ops so a listener only implements what it cares about.

use crate::protocol::FrameTag;

/// Why a connection's read loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a closing frame.
    PeerClose,
    /// The transport reached end-of-stream at a frame boundary.
    TransportClosed,
    /// This side initiated the close.
    LocalClose,
    /// The connection was aborted by a terminal protocol or I/O error.
    Aborted(String),
}

/// Per-connection application callbacks.
///
/// Invoked from the connection's single logical reader; implementations
/// never see two frames from the same connection concurrently.
pub trait SocketListener: Send {
    /// The handshake completed and frame traffic may begin.
    fn on_connection_established(&mut self) {}

    /// A text frame arrived.
    fn on_text_frame(&mut self, _text: &str) {}

    /// A binary frame arrived.
    fn on_binary_frame(&mut self, _data: &[u8]) {}

    /// A control frame (ping/pong/closing) arrived. Protocol-level
    /// auto-responses have already been decided by the frame type; this is
    /// informational.
    fn on_control_frame(&mut self, _tag: FrameTag, _data: &[u8]) {}

    /// The read loop ended. Called exactly once.
    fn on_closed(&mut self, _reason: CloseReason) {}
}

/// Listener that ignores everything. Useful as a default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl SocketListener for NullListener {}
