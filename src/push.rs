//! Server push descriptors.
//!
//! A [`PushData`] bundles everything the host needs to push a resource to
//! an established connection: the content itself, its type, the response
//! status, and a relative priority. Instances are immutable; build them
//! with the fluent [`PushDataBuilder`].
//!
//! # Example
//!
//! ```ignore
//! use websock_core::push::PushData;
//!
//! let push = PushData::builder()
//!     .content_type("text/css")
//!     .priority(1)
//!     .bytes(b"body { margin: 0 }".as_slice())
//!     .build()?;
//! ```

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::{Result, WebSockError};

/// Highest push priority.
pub const MAX_PRIORITY: u8 = 0;
/// Lowest push priority.
pub const MIN_PRIORITY: u8 = 7;

/// Status line of a pushed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStatus {
    code: u16,
    reason: String,
}

impl HttpStatus {
    /// `200 OK`.
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Status with the conventional reason phrase for `code`, or an empty
    /// phrase when the code has no well-known one.
    pub fn from_code(code: u16) -> Self {
        let reason = match code {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "",
        };
        Self::new(code, reason)
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.reason)
        }
    }
}

/// The content of a pushed resource.
pub enum OutputResource {
    /// Fully-buffered content.
    Bytes(Bytes),
    /// Streamed content read on demand.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl OutputResource {
    /// Buffered length, or `None` for streamed content.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Bytes(b) => Some(b.len()),
            Self::Reader(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.len(), Some(0))
    }
}

impl std::fmt::Debug for OutputResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Reader(_) => f.debug_tuple("Reader").finish(),
        }
    }
}

/// One pushable resource, immutable after construction.
#[derive(Debug)]
pub struct PushData {
    resource: OutputResource,
    priority: u8,
    status: HttpStatus,
    content_type: String,
}

impl PushData {
    pub fn builder() -> PushDataBuilder {
        PushDataBuilder::new()
    }

    pub fn resource(&self) -> &OutputResource {
        &self.resource
    }

    /// Consume the descriptor, yielding its content.
    pub fn into_resource(self) -> OutputResource {
        self.resource
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn status(&self) -> &HttpStatus {
        &self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// Fluent builder for [`PushData`].
///
/// Later calls override earlier ones; the last resource and status set
/// win. `build` fails only when no resource was supplied.
pub struct PushDataBuilder {
    resource: Option<OutputResource>,
    priority: u8,
    status: HttpStatus,
    content_type: String,
}

impl PushDataBuilder {
    fn new() -> Self {
        Self {
            resource: None,
            priority: MIN_PRIORITY,
            status: HttpStatus::ok(),
            content_type: String::from("application/octet-stream"),
        }
    }

    /// Push fully-buffered content.
    pub fn bytes(mut self, content: impl Into<Bytes>) -> Self {
        self.resource = Some(OutputResource::Bytes(content.into()));
        self
    }

    /// Push streamed content.
    pub fn reader(mut self, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.resource = Some(OutputResource::Reader(Box::new(reader)));
        self
    }

    /// Relative priority, clamped to the valid range (0 = highest).
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(MIN_PRIORITY);
        self
    }

    /// Status with the conventional reason phrase.
    pub fn status_code(mut self, code: u16) -> Self {
        self.status = HttpStatus::from_code(code);
        self
    }

    /// Status with an explicit reason phrase.
    pub fn status_code_with_reason(mut self, code: u16, reason: &str) -> Self {
        self.status = HttpStatus::new(code, reason);
        self
    }

    pub fn status(mut self, status: HttpStatus) -> Self {
        self.status = status;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// # Errors
    ///
    /// `Protocol` when no resource was supplied.
    pub fn build(self) -> Result<PushData> {
        let resource = self
            .resource
            .ok_or_else(|| WebSockError::Protocol("push data has no resource".to_string()))?;
        Ok(PushData {
            resource,
            priority: self.priority,
            status: self.status,
            content_type: self.content_type,
        })
    }
}

impl Default for PushDataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let push = PushData::builder().bytes(&b"x"[..]).build().unwrap();
        assert_eq!(push.priority(), MIN_PRIORITY);
        assert_eq!(push.status().code(), 200);
        assert_eq!(push.content_type(), "application/octet-stream");
        assert_eq!(push.resource().len(), Some(1));
    }

    #[test]
    fn test_builder_full() {
        let push = PushData::builder()
            .content_type("text/css")
            .priority(1)
            .status_code(404)
            .bytes(&b"not here"[..])
            .build()
            .unwrap();
        assert_eq!(push.priority(), 1);
        assert_eq!(push.status(), &HttpStatus::new(404, "Not Found"));
        assert_eq!(push.content_type(), "text/css");
    }

    #[test]
    fn test_priority_clamped() {
        let push = PushData::builder()
            .priority(200)
            .bytes(&b""[..])
            .build()
            .unwrap();
        assert_eq!(push.priority(), MIN_PRIORITY);
    }

    #[test]
    fn test_missing_resource_rejected() {
        assert!(matches!(
            PushData::builder().build(),
            Err(WebSockError::Protocol(_))
        ));
    }

    #[test]
    fn test_last_resource_wins() {
        let push = PushData::builder()
            .bytes(&b"first"[..])
            .bytes(&b"second!"[..])
            .build()
            .unwrap();
        match push.into_resource() {
            OutputResource::Bytes(b) => assert_eq!(&b[..], b"second!"),
            OutputResource::Reader(_) => panic!("expected buffered content"),
        }
    }

    #[test]
    fn test_reader_resource_has_no_len() {
        let push = PushData::builder()
            .reader(tokio::io::empty())
            .build()
            .unwrap();
        assert_eq!(push.resource().len(), None);
        assert!(!push.resource().is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(HttpStatus::ok().to_string(), "200 OK");
        assert_eq!(HttpStatus::from_code(599).to_string(), "599");
        assert_eq!(
            HttpStatus::new(418, "I'm a teapot").to_string(),
            "418 I'm a teapot"
        );
    }
}
