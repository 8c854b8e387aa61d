//! Header map and response sink used at the handshake boundary.
//!
//! The host HTTP layer hands the engine already-parsed request headers as a
//! [`HeaderMap`] and an output sink implementing [`ResponseSink`]. Hosts
//! without a response object of their own (and the tests) can use
//! [`RawResponse`], which renders the response head as raw HTTP/1.1 bytes.

use crate::error::{Result, WebSockError};

/// Case-insensitive, insertion-ordered header multimap.
///
/// Lookups compare names ASCII case-insensitively; repeated headers are kept
/// in insertion order and all values remain reachable via
/// [`HeaderMap::get_all`].
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header. Repeats are preserved, not replaced.
    pub fn insert(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check presence of a header by name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Check whether any value of `name`, treated as a comma-separated
    /// token list, contains `token` (ASCII case-insensitive).
    ///
    /// This is how `Connection: keep-alive, Upgrade` is matched.
    pub fn contains_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name).any(|value| {
            value
                .split(',')
                .map(str::trim)
                .any(|t| t.eq_ignore_ascii_case(token))
        })
    }

    /// Number of header entries (repeats counted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: AsRef<str>, V: AsRef<str>> FromIterator<(N, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (n, v) in iter {
            map.insert(n.as_ref(), v.as_ref());
        }
        map
    }
}

/// Output sink for the server's handshake response.
///
/// Supplied by the host HTTP layer: the negotiator sets the status line and
/// headers, then commits. Nothing reaches the wire before `commit`.
pub trait ResponseSink {
    /// Set the response status line.
    fn set_status(&mut self, code: u16, reason: &str);

    /// Set a response header.
    fn set_header(&mut self, name: &str, value: &str);

    /// Commit the response. After this the response head is final.
    fn commit(&mut self) -> Result<()>;
}

/// [`ResponseSink`] that renders the committed response head as raw
/// HTTP/1.1 bytes, for hosts that write the upgrade response directly to
/// the transport.
#[derive(Debug, Default)]
pub struct RawResponse {
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    committed: bool,
}

impl RawResponse {
    /// Create an empty, uncommitted response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `commit` has been called.
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Look up a header set on this response (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The status code set on this response.
    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Render the committed response head as wire bytes.
    ///
    /// # Errors
    ///
    /// `Protocol` if the response was never committed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.committed {
            return Err(WebSockError::Protocol(
                "response head rendered before commit".to_string(),
            ));
        }
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        Ok(head.into_bytes())
    }
}

impl ResponseSink for RawResponse {
    fn set_status(&mut self, code: u16, reason: &str) {
        self.status = code;
        self.reason = reason.to_string();
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn commit(&mut self) -> Result<()> {
        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert("Sec-WebSocket-Key", "abc");

        assert_eq!(map.get("sec-websocket-key"), Some("abc"));
        assert_eq!(map.get("SEC-WEBSOCKET-KEY"), Some("abc"));
        assert!(map.contains("Sec-WebSocket-Key"));
        assert!(!map.contains("Sec-WebSocket-Accept"));
    }

    #[test]
    fn test_repeated_headers_preserve_order() {
        let mut map = HeaderMap::new();
        map.insert("Sec-WebSocket-Protocol", "chat");
        map.insert("sec-websocket-protocol", "superchat");

        let all: Vec<&str> = map.get_all("Sec-WebSocket-Protocol").collect();
        assert_eq!(all, vec!["chat", "superchat"]);
        // get() returns the first.
        assert_eq!(map.get("Sec-WebSocket-Protocol"), Some("chat"));
    }

    #[test]
    fn test_contains_token_in_comma_list() {
        let mut map = HeaderMap::new();
        map.insert("Connection", "keep-alive, Upgrade");

        assert!(map.contains_token("Connection", "upgrade"));
        assert!(map.contains_token("Connection", "keep-alive"));
        assert!(!map.contains_token("Connection", "close"));
    }

    #[test]
    fn test_from_iterator() {
        let map: HeaderMap = [("Host", "example.com"), ("Upgrade", "WebSocket")]
            .into_iter()
            .collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("host"), Some("example.com"));
    }

    #[test]
    fn test_raw_response_renders_after_commit() {
        let mut resp = RawResponse::new();
        resp.set_status(101, "Switching Protocols");
        resp.set_header("Upgrade", "WebSocket");
        resp.set_header("Connection", "Upgrade");

        assert!(resp.to_bytes().is_err());
        resp.commit().unwrap();

        let head = String::from_utf8(resp.to_bytes().unwrap()).unwrap();
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(head.contains("Upgrade: WebSocket\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }
}
