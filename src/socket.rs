//! Per-connection WebSocket state and the frame read loop.
//!
//! A [`WebSocket`] owns everything one connection needs: the buffered
//! [`ByteCursor`] over the transport, a shared reference to the immutable
//! [`FrameTypeRegistry`], and the application's [`SocketListener`]. Nothing
//! here is shared mutably across connections.
//!
//! [`WebSocket::run`] is the frame read loop: detect a frame, decode it,
//! dispatch it, send any protocol-level auto-response, repeat. Frames on
//! one connection are processed strictly in arrival order. A transport
//! disconnect observed mid-frame aborts the current decode and no partial
//! frame is ever dispatched.

use std::sync::Arc;

use crate::cursor::{ByteCursor, Transport};
use crate::error::{Result, WebSockError};
use crate::handler::{CloseReason, SocketListener};
use crate::handshake::{Handshake, HeaderMap, ResponseSink};
use crate::protocol::{Frame, FrameTag, FrameTypeRegistry};

/// Server-side upgrade options.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Whether the transport is TLS-terminated.
    pub secure: bool,
    /// Sub-protocols the server supports; `None` passes the client's list
    /// through verbatim.
    pub protocols: Option<Vec<String>>,
    /// Extensions the server supports; `None` passes the client's list
    /// through verbatim.
    pub extensions: Option<Vec<String>>,
}

/// One established WebSocket connection.
pub struct WebSocket {
    cursor: ByteCursor,
    registry: Arc<FrameTypeRegistry>,
    listener: Box<dyn SocketListener>,
    close_sent: bool,
}

impl WebSocket {
    /// Wrap an already-established connection (handshake done elsewhere).
    pub fn new(
        transport: impl Transport + 'static,
        registry: Arc<FrameTypeRegistry>,
        listener: Box<dyn SocketListener>,
    ) -> Self {
        Self {
            cursor: ByteCursor::new(transport),
            registry,
            listener,
            close_sent: false,
        }
    }

    /// Perform the server side of the upgrade handshake and return the
    /// established socket.
    ///
    /// `resource_path` and `headers` come from the host-parsed request;
    /// the accept response goes out through `sink`. The handshake state is
    /// discarded once the response is committed.
    ///
    /// # Errors
    ///
    /// `HandshakeRejected` before anything is written to `sink` when a
    /// required header is missing or malformed.
    pub fn upgrade(
        transport: impl Transport + 'static,
        resource_path: &str,
        headers: &HeaderMap,
        sink: &mut dyn ResponseSink,
        options: &ServerOptions,
        registry: Arc<FrameTypeRegistry>,
        listener: Box<dyn SocketListener>,
    ) -> Result<Self> {
        let mut handshake = Handshake::server(resource_path, headers, options.secure)?;
        handshake.negotiate(options.protocols.as_deref(), options.extensions.as_deref())?;
        handshake.respond(sink)?;
        Ok(Self::new(transport, registry, listener))
    }

    /// Run the frame read loop until the connection ends.
    ///
    /// Invokes `on_connection_established` once, then dispatches frames in
    /// arrival order. Returns `Ok(())` on an orderly end (peer close or
    /// transport EOF at a frame boundary); terminal errors invoke
    /// `on_closed` with the reason and are returned to the host. No retry
    /// happens here — reconnect policy belongs to the host.
    pub async fn run(&mut self) -> Result<()> {
        self.listener.on_connection_established();
        let registry = self.registry.clone();

        loop {
            // EOF is orderly only at a frame boundary with nothing buffered.
            if !self.cursor.has_buffered() {
                match self.cursor.fill().await {
                    Ok(_) => {}
                    Err(WebSockError::ConnectionClosed) => {
                        self.listener.on_closed(CloseReason::TransportClosed);
                        return Ok(());
                    }
                    Err(e) => return self.abort(e),
                }
            }

            match registry.detect(&mut self.cursor).await {
                Ok(Some(frame)) => {
                    if self.handle_frame(&registry, frame).await? {
                        return Ok(());
                    }
                }
                Ok(None) => {
                    // No descriptor matched the buffered prefix; wait for
                    // more lookahead bytes. EOF here leaves unframed bytes
                    // behind, which is terminal.
                    if let Err(e) = self.cursor.fill().await {
                        return self.abort(e);
                    }
                }
                Err(e) => return self.abort(e),
            }
        }
    }

    /// Dispatch one decoded frame. Returns `true` when the loop must end.
    async fn handle_frame(
        &mut self,
        registry: &FrameTypeRegistry,
        frame: Frame,
    ) -> Result<bool> {
        let kind = match registry.kind_for(frame.tag()) {
            Some(kind) => kind,
            None => {
                let e = WebSockError::Protocol(format!(
                    "no descriptor for detected tag {:?}",
                    frame.tag()
                ));
                return self.abort(e).map(|_| true);
            }
        };

        let outcome = match kind.dispatch(&frame, self.listener.as_mut()) {
            Ok(outcome) => outcome,
            Err(e) => return self.abort(e).map(|_| true),
        };

        if let Some(reply) = outcome.reply {
            // A close echo is suppressed when this side already sent its
            // own closing frame, otherwise both ends would echo forever.
            let suppress = outcome.close && self.close_sent;
            if !suppress {
                if let Err(e) = self.send_frame(&reply).await {
                    return self.abort(e).map(|_| true);
                }
            }
        }

        if outcome.close {
            let reason = if self.close_sent {
                CloseReason::LocalClose
            } else {
                CloseReason::PeerClose
            };
            self.listener.on_closed(reason);
            return Ok(true);
        }
        Ok(false)
    }

    fn abort(&mut self, error: WebSockError) -> Result<()> {
        tracing::error!("read loop error: {}", error);
        self.listener
            .on_closed(CloseReason::Aborted(error.to_string()));
        Err(error)
    }

    /// Send a text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(FrameTag::Text, text.as_bytes()).await
    }

    /// Send a binary frame.
    pub async fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.send(FrameTag::Binary, data).await
    }

    /// Send a ping frame.
    pub async fn send_ping(&mut self, data: &[u8]) -> Result<()> {
        self.send(FrameTag::Ping, data).await
    }

    /// Send an application-constructed frame under its current tag.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.tag(), frame.payload()).await
    }

    /// Initiate the close handshake. Idempotent: the closing frame goes
    /// out at most once.
    pub async fn close(&mut self) -> Result<()> {
        if self.close_sent {
            return Ok(());
        }
        self.close_sent = true;
        self.send(FrameTag::Closing, b"").await
    }

    async fn send(&mut self, tag: FrameTag, payload: &[u8]) -> Result<()> {
        let wire = self.registry.encode(tag, payload)?;
        self.cursor.write(&wire).await
    }
}

impl std::fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocket")
            .field("cursor", &self.cursor)
            .field("close_sent", &self.close_sent)
            .finish()
    }
}
