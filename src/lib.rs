//! # websock-core
//!
//! Transport-agnostic WebSocket protocol engine.
//!
//! This crate implements the handshake, framing, and per-connection
//! dispatch layers of a WebSocket endpoint. It owns no sockets: the host
//! supplies any `AsyncRead + AsyncWrite` transport and parses the inbound
//! HTTP request head; everything after that is handled here.
//!
//! ## Architecture
//!
//! - **Handshake** ([`handshake`]): header validation, accept-key
//!   derivation, sub-protocol and extension negotiation, for both roles
//! - **Framing** ([`protocol`]): frame type descriptors behind an ordered
//!   [`FrameTypeRegistry`] that detects, decodes, and encodes frames
//! - **Connection** ([`socket`]): the [`WebSocket`] read loop that
//!   dispatches decoded frames to a [`SocketListener`] in arrival order
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use websock_core::{
//!     FrameTypeRegistry, HeaderMap, NullListener, RawResponse, ServerOptions, WebSocket,
//! };
//!
//! #[tokio::main]
//! async fn main() -> websock_core::Result<()> {
//!     let (transport, resource_path, headers) = accept_upgrade_request().await?;
//!     let mut sink = RawResponse::new();
//!     let mut socket = WebSocket::upgrade(
//!         transport,
//!         &resource_path,
//!         &headers,
//!         &mut sink,
//!         &ServerOptions::default(),
//!         Arc::new(FrameTypeRegistry::standard()),
//!         Box::new(NullListener),
//!     )?;
//!     socket.run().await
//! }
//! ```

pub mod cursor;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod protocol;
pub mod push;
pub mod socket;

pub use cursor::{ByteCursor, Transport};
pub use error::{Result, WebSockError};
pub use handler::{CloseReason, NullListener, SocketListener};
pub use handshake::{Handshake, HeaderMap, RawResponse, ResponseSink, Role, SecKey};
pub use protocol::{Frame, FrameKind, FrameTag, FrameTypeRegistry};
pub use push::{PushData, PushDataBuilder};
pub use socket::{ServerOptions, WebSocket};
