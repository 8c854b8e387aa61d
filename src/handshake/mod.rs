//! HTTP-Upgrade handshake negotiation, client and server roles.
//!
//! The handshake precedes all frame traffic. The server role consumes
//! already-parsed request headers ([`HeaderMap`]) and emits its response
//! through a host-supplied [`ResponseSink`]; the client role assembles the
//! upgrade request as deterministic text and writes it through the
//! connection's [`ByteCursor`].
//!
//! Each operation is phase-checked, so calling out of order (responding
//! before validation, validating a response twice) is a `Protocol` error
//! rather than silent misbehavior:
//!
//! - server: validate -> negotiate -> respond -> `Established | Failed`
//! - client: `Idle` -> initiate -> `AwaitingResponse` -> validate ->
//!   `Established | Failed`
//!
//! Server validation order is deterministic and documented: `Upgrade`,
//! then `Connection`, then `Host`, then `Sec-WebSocket-Key`, then origin.
//! The first missing or malformed header wins, and rejection happens
//! before any response bytes exist.

mod headers;
mod key;

pub use headers::{HeaderMap, RawResponse, ResponseSink};
pub use key::{derive_accept_key, SecKey, KEY_GUID};

use crate::cursor::ByteCursor;
use crate::error::{Result, WebSockError};

/// Token expected in the `Upgrade` header, and echoed in the response.
pub const UPGRADE_TOKEN: &str = "WebSocket";

/// Nonce header sent by the client.
pub const SEC_WS_KEY_HEADER: &str = "Sec-WebSocket-Key";

/// Accept-key header sent by the server.
pub const SEC_WS_ACCEPT_HEADER: &str = "Sec-WebSocket-Accept";

/// Sub-protocol list header (request and response).
pub const SEC_WS_PROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

/// Extension list header (request and response).
pub const SEC_WS_EXTENSIONS_HEADER: &str = "Sec-WebSocket-Extensions";

/// Protocol version header sent by the client.
pub const SEC_WS_VERSION_HEADER: &str = "Sec-WebSocket-Version";

/// Origin header in its draft spelling. Plain `Origin` is accepted as a
/// fallback on the server side.
pub const SEC_WS_ORIGIN_HEADER: &str = "Sec-WebSocket-Origin";

/// Protocol draft version advertised by the client role.
pub const PROTOCOL_VERSION: u8 = 6;

/// Status line of a successful upgrade response.
pub const RESPONSE_CODE: u16 = 101;

/// Reason phrase of a successful upgrade response.
pub const RESPONSE_REASON: &str = "Switching Protocols";

/// Which side of the handshake this state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiates the upgrade request.
    Client,
    /// Validates the request and emits the accept response.
    Server,
}

/// Handshake state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    // Client side.
    Idle,
    AwaitingResponse,
    // Server side. The request itself is parsed by the host, so the state
    // observable here starts at validation.
    ComputingAcceptKey,
    // Both sides.
    Established,
    Failed,
}

/// Per-connection handshake state.
///
/// Created once at handshake start, mutated only during negotiation, and
/// discarded once the handshake completes or fails. Never reused across
/// connections.
#[derive(Debug, Clone)]
pub struct Handshake {
    role: Role,
    phase: Phase,
    secure: bool,
    resource_path: String,
    server_host: String,
    port: u16,
    origin: Option<String>,
    sub_protocols: Vec<String>,
    extensions: Vec<String>,
    enabled_protocols: Vec<String>,
    enabled_extensions: Vec<String>,
    key: SecKey,
}

impl Handshake {
    // ========================================================================
    // Server role
    // ========================================================================

    /// Validate an incoming upgrade request (server role).
    ///
    /// `resource_path` is the request target from the host-parsed request
    /// line; `headers` are the host-parsed request headers.
    ///
    /// Runs the full `ValidatingHeaders` step in the documented order and
    /// adopts the client nonce. On success the returned state sits in the
    /// accept-key phase, ready for [`Handshake::negotiate`] and
    /// [`Handshake::respond`].
    ///
    /// # Errors
    ///
    /// `HandshakeRejected` naming the first missing or malformed required
    /// header. No response bytes have been produced at that point.
    pub fn server(resource_path: &str, headers: &HeaderMap, secure: bool) -> Result<Self> {
        if headers
            .get("Upgrade")
            .filter(|v| v.eq_ignore_ascii_case(UPGRADE_TOKEN))
            .is_none()
        {
            return Err(reject("missing or mismatched Upgrade header"));
        }

        if !headers.contains_token("Connection", "Upgrade") {
            return Err(reject("Connection header does not contain Upgrade"));
        }

        let host = headers
            .get("Host")
            .ok_or_else(|| reject("missing Host header"))?;
        let (server_host, port) = parse_host_port(host, secure)?;

        let nonce = headers
            .get(SEC_WS_KEY_HEADER)
            .ok_or_else(|| reject("missing Sec-WebSocket-Key header"))?;

        let origin = headers
            .get(SEC_WS_ORIGIN_HEADER)
            .or_else(|| headers.get("Origin"))
            .ok_or_else(|| reject("missing origin header"))?;

        let sub_protocols = split_list(headers.get(SEC_WS_PROTOCOL_HEADER));
        let extensions = split_list(headers.get(SEC_WS_EXTENSIONS_HEADER));

        tracing::debug!(
            host = server_host.as_str(),
            port,
            path = resource_path,
            "upgrade request validated"
        );

        Ok(Self {
            role: Role::Server,
            phase: Phase::ComputingAcceptKey,
            secure,
            resource_path: resource_path.to_string(),
            server_host,
            port,
            origin: Some(origin.to_string()),
            // Selection defaults to passing the client lists through
            // verbatim; `negotiate` narrows them.
            enabled_protocols: sub_protocols.clone(),
            enabled_extensions: extensions.clone(),
            sub_protocols,
            extensions,
            key: SecKey::new(nonce),
        })
    }

    /// Narrow the negotiated sub-protocol and extension lists (server role).
    ///
    /// `None` leaves the client's list untouched (pass-through); `Some`
    /// intersects it with the server's supported set, preserving client
    /// order.
    pub fn negotiate(
        &mut self,
        protocols: Option<&[String]>,
        extensions: Option<&[String]>,
    ) -> Result<()> {
        self.expect_phase(Phase::ComputingAcceptKey, "negotiate")?;
        if let Some(supported) = protocols {
            self.enabled_protocols = intersect(&self.sub_protocols, supported);
        }
        if let Some(supported) = extensions {
            self.enabled_extensions = intersect(&self.extensions, supported);
        }
        Ok(())
    }

    /// Emit the accept response through the host's sink (server role).
    ///
    /// Sets the fixed status line, the `Upgrade`/`Connection` headers, the
    /// derived accept key, and the negotiated lists (only when non-empty),
    /// then commits and transitions to `Established`.
    pub fn respond(&mut self, sink: &mut dyn ResponseSink) -> Result<()> {
        self.expect_phase(Phase::ComputingAcceptKey, "respond")?;

        sink.set_status(RESPONSE_CODE, RESPONSE_REASON);
        sink.set_header("Upgrade", UPGRADE_TOKEN);
        sink.set_header("Connection", "Upgrade");
        sink.set_header(SEC_WS_ACCEPT_HEADER, &self.key.accept_key());
        if !self.enabled_protocols.is_empty() {
            sink.set_header(SEC_WS_PROTOCOL_HEADER, &join_list(&self.enabled_protocols));
        }
        if !self.enabled_extensions.is_empty() {
            sink.set_header(
                SEC_WS_EXTENSIONS_HEADER,
                &join_list(&self.enabled_extensions),
            );
        }

        if let Err(e) = sink.commit() {
            self.phase = Phase::Failed;
            return Err(e);
        }

        self.phase = Phase::Established;
        tracing::debug!(location = self.location().as_str(), "handshake established");
        Ok(())
    }

    // ========================================================================
    // Client role
    // ========================================================================

    /// Start a client-role handshake with a freshly generated nonce.
    ///
    /// Use the fluent setters to adjust origin, security, and the
    /// sub-protocol/extension wish lists before [`Handshake::initiate`].
    pub fn client(server_host: &str, port: u16, resource_path: &str) -> Self {
        Self {
            role: Role::Client,
            phase: Phase::Idle,
            secure: false,
            resource_path: resource_path.to_string(),
            server_host: server_host.to_string(),
            port,
            origin: None,
            sub_protocols: Vec::new(),
            extensions: Vec::new(),
            enabled_protocols: Vec::new(),
            enabled_extensions: Vec::new(),
            key: SecKey::generate(),
        }
    }

    /// Mark the connection as TLS-terminated (`wss`).
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the `Origin` advertised in the request. Defaults to a scheme +
    /// host value derived from the server host.
    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    /// Request a sub-protocol. Order of calls is the preference order.
    pub fn sub_protocol(mut self, protocol: &str) -> Self {
        self.sub_protocols.push(protocol.to_string());
        self
    }

    /// Request an extension. Order of calls is the preference order.
    pub fn extension(mut self, extension: &str) -> Self {
        self.extensions.push(extension.to_string());
        self
    }

    /// Write the upgrade request (client role).
    ///
    /// The request is deterministic text assembly: request line, `Host`,
    /// `Connection: Upgrade`, `Upgrade: WebSocket`, the nonce, origin and
    /// version headers, and the sub-protocol/extension lists only when
    /// non-empty — an empty list emits no header at all. The whole request
    /// goes out in one atomic cursor write.
    pub async fn initiate(&mut self, cursor: &mut ByteCursor) -> Result<()> {
        self.expect_phase(Phase::Idle, "initiate")?;

        let mut request = format!("GET {} HTTP/1.1\r\n", self.resource_path);
        request.push_str(&format!("Host: {}\r\n", self.host_header()));
        request.push_str("Connection: Upgrade\r\n");
        request.push_str(&format!("Upgrade: {}\r\n", UPGRADE_TOKEN));
        request.push_str(&format!("{}: {}\r\n", SEC_WS_KEY_HEADER, self.key.nonce()));
        request.push_str(&format!(
            "{}: {}\r\n",
            SEC_WS_ORIGIN_HEADER,
            self.origin_or_default()
        ));
        request.push_str(&format!(
            "{}: {}\r\n",
            SEC_WS_VERSION_HEADER, PROTOCOL_VERSION
        ));
        if !self.sub_protocols.is_empty() {
            request.push_str(&format!(
                "{}: {}\r\n",
                SEC_WS_PROTOCOL_HEADER,
                join_list(&self.sub_protocols)
            ));
        }
        if !self.extensions.is_empty() {
            request.push_str(&format!(
                "{}: {}\r\n",
                SEC_WS_EXTENSIONS_HEADER,
                join_list(&self.extensions)
            ));
        }
        request.push_str("\r\n");

        cursor.write(request.as_bytes()).await?;
        self.phase = Phase::AwaitingResponse;
        tracing::debug!(location = self.location().as_str(), "upgrade request sent");
        Ok(())
    }

    /// Validate the server's response headers (client role).
    ///
    /// Recomputes the accept key from the original nonce and compares
    /// byte-for-byte; also checks the `Upgrade`/`Connection` echo. Any miss
    /// is `HandshakeRejected` and the state transitions to failed.
    pub fn validate_server_response(&mut self, headers: &HeaderMap) -> Result<()> {
        self.expect_phase(Phase::AwaitingResponse, "validate_server_response")?;

        let result = self.check_server_response(headers);
        match &result {
            Ok(()) => {
                self.enabled_protocols = split_list(headers.get(SEC_WS_PROTOCOL_HEADER));
                self.enabled_extensions = split_list(headers.get(SEC_WS_EXTENSIONS_HEADER));
                self.phase = Phase::Established;
                tracing::debug!(
                    location = self.location().as_str(),
                    "server response validated"
                );
            }
            Err(_) => self.phase = Phase::Failed,
        }
        result
    }

    fn check_server_response(&self, headers: &HeaderMap) -> Result<()> {
        if headers
            .get("Upgrade")
            .filter(|v| v.eq_ignore_ascii_case(UPGRADE_TOKEN))
            .is_none()
        {
            return Err(reject("response missing Upgrade header"));
        }
        if !headers.contains_token("Connection", "Upgrade") {
            return Err(reject("response Connection header does not contain Upgrade"));
        }
        let accept = headers
            .get(SEC_WS_ACCEPT_HEADER)
            .ok_or_else(|| reject("response missing Sec-WebSocket-Accept header"))?;
        self.key.validate_accept(accept)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The side this state belongs to.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the handshake reached `Established`.
    #[inline]
    pub fn is_established(&self) -> bool {
        self.phase == Phase::Established
    }

    /// Whether the connection is TLS-terminated.
    #[inline]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Request target path.
    #[inline]
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// Server host name.
    #[inline]
    pub fn server_host(&self) -> &str {
        &self.server_host
    }

    /// Server port.
    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Origin, if one was supplied or parsed.
    pub fn get_origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Sub-protocols requested by the client, in preference order.
    pub fn sub_protocols(&self) -> &[String] {
        &self.sub_protocols
    }

    /// Extensions requested by the client, in preference order.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Negotiated sub-protocols.
    pub fn enabled_protocols(&self) -> &[String] {
        &self.enabled_protocols
    }

    /// Negotiated extensions.
    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    /// The nonce/accept-key pair for this handshake.
    pub fn key(&self) -> &SecKey {
        &self.key
    }

    /// The `ws`/`wss` location this handshake addresses.
    pub fn location(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        if self.port == self.default_port() {
            format!("{}://{}{}", scheme, self.server_host, self.resource_path)
        } else {
            format!(
                "{}://{}:{}{}",
                scheme, self.server_host, self.port, self.resource_path
            )
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn default_port(&self) -> u16 {
        if self.secure {
            443
        } else {
            80
        }
    }

    fn host_header(&self) -> String {
        if self.port == self.default_port() {
            self.server_host.clone()
        } else {
            format!("{}:{}", self.server_host, self.port)
        }
    }

    fn origin_or_default(&self) -> String {
        match &self.origin {
            Some(origin) => origin.clone(),
            None => {
                let scheme = if self.secure { "https" } else { "http" };
                format!("{}://{}", scheme, self.server_host)
            }
        }
    }

    fn expect_phase(&mut self, expected: Phase, op: &str) -> Result<()> {
        if self.phase != expected {
            return Err(WebSockError::Protocol(format!(
                "{} called in phase {:?}",
                op, self.phase
            )));
        }
        Ok(())
    }
}

fn reject(reason: &str) -> WebSockError {
    tracing::debug!(reason, "rejecting handshake");
    WebSockError::HandshakeRejected(reason.to_string())
}

/// Parse a `Host` header value into host and port, with scheme defaults.
fn parse_host_port(host: &str, secure: bool) -> Result<(String, u16)> {
    match host.split_once(':') {
        Some((name, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| reject("malformed port in Host header"))?;
            Ok((name.to_string(), port))
        }
        None => Ok((host.to_string(), if secure { 443 } else { 80 })),
    }
}

/// Split a comma-separated header value into trimmed, non-empty items.
fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Join list items back into a header value.
fn join_list(items: &[String]) -> String {
    items.join(", ")
}

/// Intersection of `requested` and `supported`, preserving `requested`'s
/// order.
fn intersect(requested: &[String], supported: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|r| supported.iter().any(|s| s.eq_ignore_ascii_case(r)))
        .cloned()
        .collect()
}
