//! The gRPC status pair carried in trailers.

use crate::code::Code;
use http::HeaderMap;
use std::fmt;

/// `grpc-status` / `grpc-message`, the pair of trailers every gRPC response
/// carries at end-of-stream.
///
/// Defaults match the wire default: `grpc-status: 0` ("ok"), empty message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trailers {
    pub status: Code,
    pub message: String,
}

impl Trailers {
    pub fn new(status: Code, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The synthesized trailers `recv` returns when a deadline fires before
    /// the receiver task delivers a message for the stream.
    pub fn deadline_exceeded() -> Self {
        Self::new(Code::DeadlineExceeded, "DEADLINE_EXCEEDED")
    }

    /// Extract `grpc-status`/`grpc-message` from a header map, applying the
    /// wire defaults (`"0"` / `""`) when either is absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let status = headers
            .get("grpc-status")
            .and_then(|v| v.to_str().ok())
            .map(Code::from_header)
            .unwrap_or(Code::Ok);
        let message = headers
            .get("grpc-message")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        Self { status, message }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Code::Ok
    }
}

impl fmt::Display for Trailers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grpc-status={} grpc-message={:?}", self.status, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn defaults_to_ok_empty() {
        let t = Trailers::default();
        assert!(t.is_ok());
        assert_eq!(t.message, "");
    }

    #[test]
    fn parses_from_headers() {
        let mut h = HeaderMap::new();
        h.insert("grpc-status", HeaderValue::from_static("5"));
        h.insert("grpc-message", HeaderValue::from_static("nope"));
        let t = Trailers::from_headers(&h);
        assert_eq!(t.status, Code::NotFound);
        assert_eq!(t.message, "nope");
    }

    #[test]
    fn missing_headers_use_wire_defaults() {
        let t = Trailers::from_headers(&HeaderMap::new());
        assert_eq!(t.status, Code::Ok);
        assert_eq!(t.message, "");
    }

    #[test]
    fn deadline_exceeded_helper() {
        let t = Trailers::deadline_exceeded();
        assert_eq!(t.status, Code::DeadlineExceeded);
        assert_eq!(t.message, "DEADLINE_EXCEEDED");
    }
}
