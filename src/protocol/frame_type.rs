//! Frame type descriptors: one policy object per wire framing variant.
//!
//! Each descriptor knows how to recognize its discriminant on the wire
//! without consuming bytes, decode exactly one frame once recognized,
//! encode a payload into exact wire bytes, and route a decoded frame to
//! the application callbacks (including protocol-level auto-responses).
//!
//! Wire encodings:
//!
//! ```text
//! text:    0x00 <utf-8 payload> 0xFF
//! binary:  0x80 <length varint> <payload>
//! ping:    0x81 <length varint> <payload>
//! pong:    0x82 <length varint> <payload>
//! closing: 0xFF 0x00
//! ```
//!
//! The length varint is big-endian 7-bit groups; every byte except the
//! last has the high bit set.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use super::frame::Frame;
use crate::cursor::ByteCursor;
use crate::error::{Result, WebSockError};
use crate::handler::SocketListener;

/// Boxed future for descriptor capabilities that suspend on the cursor.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Leading marker of a text frame.
pub const TEXT_MARKER: u8 = 0x00;

/// Terminator of a text frame.
pub const TEXT_TERMINATOR: u8 = 0xFF;

/// Leading marker of a length-prefixed binary frame.
pub const BINARY_MARKER: u8 = 0x80;

/// Leading marker of a ping frame.
pub const PING_MARKER: u8 = 0x81;

/// Leading marker of a pong frame.
pub const PONG_MARKER: u8 = 0x82;

/// Fixed two-byte closing frame.
pub const CLOSING_FRAME: [u8; 2] = [0xFF, 0x00];

/// Default sane bound on a single frame's payload (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Maximum number of 7-bit groups accepted in a length prefix.
const MAX_LENGTH_GROUPS: u32 = 8;

/// Closed enumeration of the frame encodings the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTag {
    /// Delimiter-framed UTF-8 text.
    Text,
    /// Length-prefixed binary payload.
    Binary,
    /// Length-prefixed ping; answered with a pong automatically.
    Ping,
    /// Length-prefixed pong.
    Pong,
    /// Close signal; echoed once and terminates the read loop.
    Closing,
}

impl FrameTag {
    /// Whether this tag is a control type (ping/pong/closing).
    #[inline]
    pub fn is_control(self) -> bool {
        matches!(self, FrameTag::Ping | FrameTag::Pong | FrameTag::Closing)
    }
}

/// What the read loop must do after a frame was routed.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Protocol-level auto-response to send (pong for a ping, close echo).
    pub reply: Option<Frame>,
    /// Terminate the read loop after sending `reply`.
    pub close: bool,
}

/// One wire framing variant: recognition, codec, and dispatch policy.
///
/// Descriptors are stateless and shared read-only across connections.
pub trait FrameKind: Send + Sync {
    /// Tag stamped on frames decoded by this descriptor.
    fn tag(&self) -> FrameTag;

    /// Peek this descriptor's discriminant without consuming bytes.
    ///
    /// Returns `false` when fewer bytes are buffered than the discriminant
    /// needs; detection is re-entrant and is simply retried once more
    /// bytes arrive.
    fn recognize<'a>(&'a self, cursor: &'a mut ByteCursor) -> BoxFuture<'a, Result<bool>>;

    /// Consume exactly the bytes of one frame and return it.
    ///
    /// Only called after `recognize` returned `true`. Suspends on the
    /// cursor while the frame is incomplete; a transport EOF mid-frame
    /// surfaces as `ConnectionClosed` and no partial frame is produced.
    fn decode<'a>(&'a self, cursor: &'a mut ByteCursor) -> BoxFuture<'a, Result<Frame>>;

    /// Produce the exact wire bytes framing `payload`.
    fn encode(&self, payload: &[u8]) -> Vec<u8>;

    /// Route a decoded frame to the listener and report the protocol-level
    /// follow-up the read loop must perform.
    fn dispatch(&self, frame: &Frame, listener: &mut dyn SocketListener)
        -> Result<DispatchOutcome>;
}

// ============================================================================
// Text frames: 0x00 <payload> 0xFF
// ============================================================================

/// Delimiter-framed UTF-8 text.
#[derive(Debug, Clone)]
pub struct TextKind {
    max_len: usize,
}

impl TextKind {
    /// Text descriptor with the default payload bound.
    pub fn new() -> Self {
        Self {
            max_len: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Text descriptor with a custom payload bound.
    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Default for TextKind {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameKind for TextKind {
    fn tag(&self) -> FrameTag {
        FrameTag::Text
    }

    fn recognize<'a>(&'a self, cursor: &'a mut ByteCursor) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { cursor.peek(&[TEXT_MARKER]).await })
    }

    fn decode<'a>(&'a self, cursor: &'a mut ByteCursor) -> BoxFuture<'a, Result<Frame>> {
        Box::pin(async move {
            let marker = cursor.read_byte().await?;
            if marker != TEXT_MARKER {
                return Err(WebSockError::MalformedFrame(format!(
                    "expected text marker 0x00, found {:#04x}",
                    marker
                )));
            }
            let mut payload = Vec::new();
            loop {
                let byte = cursor.read_byte().await?;
                if byte == TEXT_TERMINATOR {
                    break;
                }
                payload.push(byte);
                if payload.len() > self.max_len {
                    return Err(WebSockError::MalformedFrame(format!(
                        "unterminated text frame exceeds maximum {} bytes",
                        self.max_len
                    )));
                }
            }
            Ok(Frame::new(FrameTag::Text, Bytes::from(payload)))
        })
    }

    fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut wire = Vec::with_capacity(payload.len() + 2);
        wire.push(TEXT_MARKER);
        wire.extend_from_slice(payload);
        wire.push(TEXT_TERMINATOR);
        wire
    }

    fn dispatch(
        &self,
        frame: &Frame,
        listener: &mut dyn SocketListener,
    ) -> Result<DispatchOutcome> {
        listener.on_text_frame(frame.text_payload()?);
        Ok(DispatchOutcome::default())
    }
}

// ============================================================================
// Length-prefixed frames: <marker> <length varint> <payload>
// ============================================================================

/// Length-prefixed framing shared by the binary, ping, and pong variants.
#[derive(Debug, Clone)]
pub struct LengthPrefixedKind {
    tag: FrameTag,
    marker: u8,
    max_len: usize,
}

impl LengthPrefixedKind {
    fn new(tag: FrameTag, marker: u8) -> Self {
        Self {
            tag,
            marker,
            max_len: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Binary payload descriptor (marker `0x80`).
    pub fn binary() -> Self {
        Self::new(FrameTag::Binary, BINARY_MARKER)
    }

    /// Ping descriptor (marker `0x81`).
    pub fn ping() -> Self {
        Self::new(FrameTag::Ping, PING_MARKER)
    }

    /// Pong descriptor (marker `0x82`).
    pub fn pong() -> Self {
        Self::new(FrameTag::Pong, PONG_MARKER)
    }

    /// Override the payload bound.
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}

impl FrameKind for LengthPrefixedKind {
    fn tag(&self) -> FrameTag {
        self.tag
    }

    fn recognize<'a>(&'a self, cursor: &'a mut ByteCursor) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { cursor.peek(&[self.marker]).await })
    }

    fn decode<'a>(&'a self, cursor: &'a mut ByteCursor) -> BoxFuture<'a, Result<Frame>> {
        Box::pin(async move {
            let marker = cursor.read_byte().await?;
            if marker != self.marker {
                return Err(WebSockError::MalformedFrame(format!(
                    "expected marker {:#04x}, found {:#04x}",
                    self.marker, marker
                )));
            }

            let mut length: usize = 0;
            let mut groups = 0u32;
            loop {
                let byte = cursor.read_byte().await?;
                length = (length << 7) | (byte & 0x7F) as usize;
                groups += 1;
                if byte & 0x80 == 0 {
                    break;
                }
                if groups >= MAX_LENGTH_GROUPS {
                    return Err(WebSockError::MalformedFrame(
                        "length prefix has too many continuation bytes".to_string(),
                    ));
                }
            }
            if length > self.max_len {
                return Err(WebSockError::MalformedFrame(format!(
                    "declared length {} exceeds maximum {}",
                    length, self.max_len
                )));
            }

            let payload = cursor.read_bytes(length).await?;
            Ok(Frame::new(self.tag, payload))
        })
    }

    fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut wire = Vec::with_capacity(payload.len() + 6);
        wire.push(self.marker);
        encode_length(payload.len(), &mut wire);
        wire.extend_from_slice(payload);
        wire
    }

    fn dispatch(
        &self,
        frame: &Frame,
        listener: &mut dyn SocketListener,
    ) -> Result<DispatchOutcome> {
        match self.tag {
            FrameTag::Binary => {
                listener.on_binary_frame(frame.payload());
                Ok(DispatchOutcome::default())
            }
            FrameTag::Ping => {
                listener.on_control_frame(FrameTag::Ping, frame.payload());
                Ok(DispatchOutcome {
                    reply: Some(Frame::new(FrameTag::Pong, frame.payload_bytes())),
                    close: false,
                })
            }
            FrameTag::Pong => {
                listener.on_control_frame(FrameTag::Pong, frame.payload());
                Ok(DispatchOutcome::default())
            }
            other => Err(WebSockError::Protocol(format!(
                "length-prefixed descriptor with unexpected tag {:?}",
                other
            ))),
        }
    }
}

/// Append a big-endian 7-bit group length prefix.
fn encode_length(mut length: usize, out: &mut Vec<u8>) {
    let mut groups = [0u8; 10];
    let mut count = 0;
    loop {
        groups[count] = (length & 0x7F) as u8;
        length >>= 7;
        count += 1;
        if length == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let mut byte = groups[i];
        if i != 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
}

// ============================================================================
// Closing frames: 0xFF 0x00
// ============================================================================

/// Fixed two-byte close signal.
///
/// Needs two bytes of lookahead to recognize, so it must be ordered before
/// any descriptor whose discriminant could shadow `0xFF`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosingKind;

impl ClosingKind {
    /// Closing descriptor.
    pub fn new() -> Self {
        Self
    }
}

impl FrameKind for ClosingKind {
    fn tag(&self) -> FrameTag {
        FrameTag::Closing
    }

    fn recognize<'a>(&'a self, cursor: &'a mut ByteCursor) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { cursor.peek(&CLOSING_FRAME).await })
    }

    fn decode<'a>(&'a self, cursor: &'a mut ByteCursor) -> BoxFuture<'a, Result<Frame>> {
        Box::pin(async move {
            let bytes = cursor.read_bytes(CLOSING_FRAME.len()).await?;
            if bytes[..] != CLOSING_FRAME {
                return Err(WebSockError::MalformedFrame(
                    "closing frame bytes did not match".to_string(),
                ));
            }
            Ok(Frame::new(FrameTag::Closing, Bytes::new()))
        })
    }

    fn encode(&self, _payload: &[u8]) -> Vec<u8> {
        CLOSING_FRAME.to_vec()
    }

    fn dispatch(
        &self,
        frame: &Frame,
        listener: &mut dyn SocketListener,
    ) -> Result<DispatchOutcome> {
        listener.on_control_frame(FrameTag::Closing, frame.payload());
        Ok(DispatchOutcome {
            reply: Some(Frame::new(FrameTag::Closing, Bytes::new())),
            close: true,
        })
    }
}
