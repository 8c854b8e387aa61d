//! Ordered frame type registry and the detection state machine.
//!
//! The registry holds the frame descriptors in priority order and runs
//! detection once per frame boundary: the first descriptor whose
//! discriminant matches owns decoding that frame. Exhausting the list with
//! bytes still buffered is "no frame yet" — some descriptors need more
//! lookahead than is currently buffered — never an error.
//!
//! A registry is immutable after construction and shared read-only across
//! all connections via `Arc`.

use std::sync::Arc;

use super::frame::Frame;
use super::frame_type::{
    ClosingKind, FrameKind, FrameTag, LengthPrefixedKind, TextKind,
};
use crate::cursor::ByteCursor;
use crate::error::{Result, WebSockError};

/// Ordered set of frame type descriptors.
#[derive(Clone)]
pub struct FrameTypeRegistry {
    kinds: Vec<Arc<dyn FrameKind>>,
}

impl FrameTypeRegistry {
    /// Registry with a custom descriptor order.
    ///
    /// Order is significant: descriptors with ambiguous prefixes must be
    /// listed most-specific first so detection resolves deterministically.
    pub fn with_kinds(kinds: Vec<Arc<dyn FrameKind>>) -> Self {
        Self { kinds }
    }

    /// Registry fixed to a single descriptor, for connections whose frame
    /// format was pinned during handshake version negotiation.
    pub fn single(kind: Arc<dyn FrameKind>) -> Self {
        Self { kinds: vec![kind] }
    }

    /// The default descriptor set, most specific first: closing (needs two
    /// bytes of lookahead and shadows `0xFF`), ping, pong, binary, text.
    pub fn standard() -> Self {
        Self::with_kinds(vec![
            Arc::new(ClosingKind::new()),
            Arc::new(LengthPrefixedKind::ping()),
            Arc::new(LengthPrefixedKind::pong()),
            Arc::new(LengthPrefixedKind::binary()),
            Arc::new(TextKind::new()),
        ])
    }

    /// Descriptor registered for `tag`, if any.
    pub fn kind_for(&self, tag: FrameTag) -> Option<&Arc<dyn FrameKind>> {
        self.kinds.iter().find(|k| k.tag() == tag)
    }

    /// Descriptors in priority order.
    pub fn kinds(&self) -> &[Arc<dyn FrameKind>] {
        &self.kinds
    }

    /// Run detection at the current frame boundary.
    ///
    /// Tries each descriptor in order; the first to recognize its
    /// discriminant decodes one full frame. Returns `Ok(None)` when no
    /// descriptor matched the buffered prefix — the caller waits for more
    /// bytes and retries. Detection peeks only, so a `None` attempt has
    /// zero side effects and is safely resumable.
    pub async fn detect(&self, cursor: &mut ByteCursor) -> Result<Option<Frame>> {
        for kind in &self.kinds {
            if kind.recognize(cursor).await? {
                let frame = kind.decode(cursor).await?;
                tracing::trace!(tag = ?frame.tag(), len = frame.payload_len(), "frame decoded");
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Encode `payload` with the descriptor registered for `tag`.
    ///
    /// # Errors
    ///
    /// `Protocol` if no descriptor carries that tag.
    pub fn encode(&self, tag: FrameTag, payload: &[u8]) -> Result<Vec<u8>> {
        let kind = self
            .kind_for(tag)
            .ok_or_else(|| WebSockError::Protocol(format!("no descriptor for tag {:?}", tag)))?;
        Ok(kind.encode(payload))
    }
}

impl Default for FrameTypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for FrameTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.kinds.iter().map(|k| k.tag()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_standard_order_is_most_specific_first() {
        let registry = FrameTypeRegistry::standard();
        let tags: Vec<FrameTag> = registry.kinds().iter().map(|k| k.tag()).collect();
        assert_eq!(
            tags,
            vec![
                FrameTag::Closing,
                FrameTag::Ping,
                FrameTag::Pong,
                FrameTag::Binary,
                FrameTag::Text,
            ]
        );
    }

    #[test]
    fn test_kind_for() {
        let registry = FrameTypeRegistry::standard();
        assert!(registry.kind_for(FrameTag::Text).is_some());
        let single = FrameTypeRegistry::single(Arc::new(TextKind::new()));
        assert!(single.kind_for(FrameTag::Binary).is_none());
    }

    #[test]
    fn test_encode_unregistered_tag_is_protocol_error() {
        let registry = FrameTypeRegistry::single(Arc::new(TextKind::new()));
        assert!(matches!(
            registry.encode(FrameTag::Ping, b""),
            Err(WebSockError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_detect_decodes_each_kind() {
        let registry = FrameTypeRegistry::standard();

        let mut wire = Vec::new();
        wire.extend(registry.encode(FrameTag::Text, b"hi").unwrap());
        wire.extend(registry.encode(FrameTag::Binary, &[1, 2, 3]).unwrap());
        wire.extend(registry.encode(FrameTag::Ping, b"p").unwrap());
        wire.extend(registry.encode(FrameTag::Closing, b"").unwrap());

        let (local, mut remote) = tokio::io::duplex(4096);
        let mut cursor = ByteCursor::new(local);
        remote.write_all(&wire).await.unwrap();

        let expectations: &[(FrameTag, &[u8])] = &[
            (FrameTag::Text, b"hi"),
            (FrameTag::Binary, &[1, 2, 3]),
            (FrameTag::Ping, b"p"),
            (FrameTag::Closing, b""),
        ];
        for (tag, payload) in expectations {
            let frame = registry.detect(&mut cursor).await.unwrap().unwrap();
            assert_eq!(frame.tag(), *tag);
            assert_eq!(frame.payload(), *payload);
        }
    }

    #[tokio::test]
    async fn test_detect_under_buffered_closing_yields_none() {
        let registry = FrameTypeRegistry::standard();
        let (local, mut remote) = tokio::io::duplex(64);
        let mut cursor = ByteCursor::new(local);

        // First byte of a closing frame: not recognizable by anything yet.
        remote.write_all(&[0xFF]).await.unwrap();
        assert!(registry.detect(&mut cursor).await.unwrap().is_none());
        // Detection consumed nothing.
        assert_eq!(cursor.buffered(), 1);

        remote.write_all(&[0x00]).await.unwrap();
        cursor.fill().await.unwrap();
        let frame = registry.detect(&mut cursor).await.unwrap().unwrap();
        assert_eq!(frame.tag(), FrameTag::Closing);
    }

    #[tokio::test]
    async fn test_detect_is_idempotent_when_no_match() {
        let registry = FrameTypeRegistry::standard();
        let (local, mut remote) = tokio::io::duplex(64);
        let mut cursor = ByteCursor::new(local);

        remote.write_all(&[0xFF]).await.unwrap();
        for _ in 0..3 {
            assert!(registry.detect(&mut cursor).await.unwrap().is_none());
            assert_eq!(cursor.buffered(), 1);
        }
    }

    #[tokio::test]
    async fn test_roundtrip_all_registered_kinds() {
        let registry = FrameTypeRegistry::standard();
        let payloads: &[&[u8]] = &[b"", b"x", b"hello world", &[0u8, 0xFF, 0x80, 0x7F]];

        for kind in registry.kinds() {
            // The closing frame carries no payload by definition.
            if kind.tag() == FrameTag::Closing {
                continue;
            }
            // Text frames cannot carry the 0xFF delimiter byte.
            for payload in payloads {
                if kind.tag() == FrameTag::Text && payload.contains(&0xFF) {
                    continue;
                }

                let wire = kind.encode(payload);
                let (local, mut remote) = tokio::io::duplex(4096);
                let mut cursor = ByteCursor::new(local);
                remote.write_all(&wire).await.unwrap();

                let frame = registry.detect(&mut cursor).await.unwrap().unwrap();
                assert_eq!(frame.tag(), kind.tag(), "tag for {:?}", kind.tag());
                assert_eq!(frame.payload(), *payload, "payload for {:?}", kind.tag());
            }
        }
    }
}
