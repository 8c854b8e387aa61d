//! Protocol module - frames, frame type descriptors, and the registry.
//!
//! This module implements the framed layer spoken after the handshake:
//! - [`Frame`]: one decoded unit of application payload
//! - [`FrameKind`] descriptors: recognition, codec, and dispatch per wire
//!   framing variant
//! - [`FrameTypeRegistry`]: ordered detection across the descriptor set

mod frame;
mod frame_type;
mod registry;

pub use frame::Frame;
pub use frame_type::{
    BoxFuture, ClosingKind, DispatchOutcome, FrameKind, FrameTag, LengthPrefixedKind, TextKind,
    BINARY_MARKER, CLOSING_FRAME, DEFAULT_MAX_FRAME_SIZE, PING_MARKER, PONG_MARKER, TEXT_MARKER,
    TEXT_TERMINATOR,
};
pub use registry::FrameTypeRegistry;
