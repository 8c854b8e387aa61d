//! Decoded frame with typed payload accessors.
//!
//! A [`Frame`] is one discrete unit of application payload, wrapped with
//! its originating [`FrameTag`]. Payload bytes are shared zero-copy via
//! `bytes::Bytes`; the UTF-8 text view is decoded lazily at most once.

use std::sync::OnceLock;

use bytes::Bytes;

use super::FrameTag;
use crate::error::{Result, WebSockError};

/// A decoded (or about-to-be-sent) frame.
///
/// Created either by the read path from wire bytes, or by the application
/// from a text/binary payload. Immutable after construction except for
/// explicit retagging via [`Frame::set_tag`]. No pooling: frames are
/// dropped after dispatch or send.
#[derive(Debug, Clone)]
pub struct Frame {
    tag: FrameTag,
    payload: Bytes,
    /// Compute-once UTF-8 view of `payload`. Always derived from the
    /// payload bytes, never mutated independently.
    text: OnceLock<String>,
}

impl Frame {
    /// Create a frame from wire bytes decoded by a descriptor.
    pub fn new(tag: FrameTag, payload: Bytes) -> Self {
        Self {
            tag,
            payload,
            text: OnceLock::new(),
        }
    }

    /// Create a text frame from a string.
    ///
    /// Populates both the payload bytes and the text view eagerly, so
    /// re-encoding reproduces the original bytes exactly.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let payload = Bytes::copy_from_slice(text.as_bytes());
        let cache = OnceLock::new();
        let _ = cache.set(text);
        Self {
            tag: FrameTag::Text,
            payload,
            text: cache,
        }
    }

    /// Create a binary frame from raw bytes (copies).
    pub fn binary(data: &[u8]) -> Self {
        Self::new(FrameTag::Binary, Bytes::copy_from_slice(data))
    }

    /// The frame's type tag.
    #[inline]
    pub fn tag(&self) -> FrameTag {
        self.tag
    }

    /// Retag the frame before sending it through a different descriptor.
    pub fn set_tag(&mut self, tag: FrameTag) {
        self.tag = tag;
    }

    /// Payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Cheap zero-copy clone of the payload.
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Payload length in bytes.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// UTF-8 text view of the payload, decoded at most once.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` if the payload is not valid UTF-8.
    pub fn text_payload(&self) -> Result<&str> {
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        let decoded = std::str::from_utf8(&self.payload)
            .map_err(|e| WebSockError::MalformedFrame(format!("invalid UTF-8 payload: {}", e)))?
            .to_string();
        Ok(self.text.get_or_init(|| decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame_populates_both_views() {
        let frame = Frame::text("hello");
        assert_eq!(frame.tag(), FrameTag::Text);
        assert_eq!(frame.payload(), b"hello");
        assert_eq!(frame.text_payload().unwrap(), "hello");
    }

    #[test]
    fn test_text_view_is_lazy_and_stable() {
        let frame = Frame::new(FrameTag::Text, Bytes::from_static("héllo".as_bytes()));
        let first = frame.text_payload().unwrap().as_ptr();
        let second = frame.text_payload().unwrap().as_ptr();
        // Decoded once, returned from the cache afterwards.
        assert_eq!(first, second);
        assert_eq!(frame.text_payload().unwrap(), "héllo");
    }

    #[test]
    fn test_invalid_utf8_is_malformed_frame() {
        let frame = Frame::new(FrameTag::Text, Bytes::from_static(&[0xC3, 0x28]));
        assert!(matches!(
            frame.text_payload(),
            Err(WebSockError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_binary_frame() {
        let frame = Frame::binary(&[1, 2, 3]);
        assert_eq!(frame.tag(), FrameTag::Binary);
        assert_eq!(frame.payload(), &[1, 2, 3]);
        assert_eq!(frame.payload_len(), 3);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_retagging() {
        let mut frame = Frame::binary(b"payload");
        frame.set_tag(FrameTag::Ping);
        assert_eq!(frame.tag(), FrameTag::Ping);
        assert_eq!(frame.payload(), b"payload");
    }

    #[test]
    fn test_payload_bytes_zero_copy() {
        let frame = Frame::new(FrameTag::Binary, Bytes::from_static(b"shared"));
        let a = frame.payload_bytes();
        let b = frame.payload_bytes();
        assert_eq!(a.as_ptr(), b.as_ptr());
    }
}
