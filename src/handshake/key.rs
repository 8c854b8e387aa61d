//! Sec-WebSocket key handling: nonce generation and accept-key derivation.
//!
//! The server proves it processed a specific handshake request by hashing
//! the client nonce together with a fixed magic GUID and echoing the
//! base64-encoded digest back. The client recomputes the same value and
//! compares byte-for-byte, which guards against handshake-hijacking and
//! misconfigured intermediaries.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::error::{Result, WebSockError};

/// Magic GUID appended to the client nonce before hashing.
/// Fixed by the protocol; never changes.
pub const KEY_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Number of random bytes in a generated nonce (before base64).
const NONCE_LEN: usize = 16;

/// Derive the accept key for a client nonce.
///
/// Pure function: base64(SHA-1(nonce ++ GUID)) over the UTF-8 bytes of the
/// concatenation.
///
/// # Example
///
/// ```
/// use websock_core::handshake::derive_accept_key;
///
/// let accept = derive_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn derive_accept_key(nonce: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce.as_bytes());
    hasher.update(KEY_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// A client nonce and its derived accept key.
///
/// Created once per handshake: generated on the client side, adopted from
/// the `Sec-WebSocket-Key` header on the server side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecKey {
    nonce: String,
}

impl SecKey {
    /// Adopt an existing nonce (server role, from the request header).
    pub fn new(nonce: &str) -> Self {
        Self {
            nonce: nonce.to_string(),
        }
    }

    /// Generate a fresh random nonce (client role).
    pub fn generate() -> Self {
        let mut raw = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut raw);
        Self {
            nonce: BASE64.encode(raw),
        }
    }

    /// The base64 nonce as sent in `Sec-WebSocket-Key`.
    #[inline]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// The accept key the server must echo for this nonce.
    pub fn accept_key(&self) -> String {
        derive_accept_key(&self.nonce)
    }

    /// Validate a server-supplied accept key against this nonce.
    ///
    /// # Errors
    ///
    /// `HandshakeRejected` on any byte mismatch.
    pub fn validate_accept(&self, accept: &str) -> Result<()> {
        if accept != self.accept_key() {
            return Err(WebSockError::HandshakeRejected(format!(
                "accept key mismatch for nonce {}",
                self.nonce
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for SecKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.nonce)
    }
}
