//! Transport-level error vocabulary.
//!
//! The transport reports failures as a bare numeric code (borrowed from the
//! errno-ish vocabulary of the source this core is ported from) rather than
//! a typed enum, because the set of codes a real HTTP/2 stack can surface is
//! open-ended. [`codes`] names the ones this core treats specially.

use std::fmt;

/// Error codes the send path recognizes as eligible for a forced reconnect.
pub mod codes {
    /// `EPIPE`-class failure: the peer reset the stream mid-write.
    pub const EPIPE: i32 = 32;
    /// `ECONNREFUSED`-class failure: nothing accepted the connection.
    pub const CONNECTION_REFUSED: i32 = 111;
    /// Internal marker: the session was observed closed after a previously
    /// successful connect (no direct OS errno equivalent).
    pub const SESSION_CLOSED: i32 = 5001;
    /// Synthesized by `recv`/`push` when a stream id was never registered.
    pub const UNKNOWN_STREAM: i32 = 86;
}

/// Returns `true` for the codes that the send path will pay to reconnect
/// over (§4.1.2): `EPIPE`, `ECONNREFUSED`, and the internal session-closed
/// marker.
pub fn is_reconnect_eligible(code: i32) -> bool {
    matches!(
        code,
        codes::EPIPE | codes::CONNECTION_REFUSED | codes::SESSION_CLOSED
    )
}

/// A human-readable name for a transport error code, in the spirit of
/// `strerror(3)`. Unrecognized codes fall back to a generic description
/// rather than panicking — the transport is free to surface codes this
/// core doesn't special-case.
pub fn strerror(code: i32) -> &'static str {
    match code {
        0 => "Success",
        codes::EPIPE => "Broken pipe",
        codes::CONNECTION_REFUSED => "Connection refused",
        codes::SESSION_CLOSED => "Session closed",
        codes::UNKNOWN_STREAM => "Unknown stream",
        _ => "Transport error",
    }
}

/// A transport-level failure: a numeric code plus the formatted
/// `strerror(code) + " host:port"` message the original source produces.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub code: i32,
    pub message: String,
}

impl TransportError {
    /// Build a `TransportError` the way the send/connect path does: the
    /// message is always `strerror(code) + " " + endpoint`.
    pub fn new(code: i32, endpoint: impl fmt::Display) -> Self {
        Self {
            code,
            message: format!("{} {}", strerror(code), endpoint),
        }
    }

    pub fn unknown_stream(endpoint: impl fmt::Display) -> Self {
        Self::new(codes::UNKNOWN_STREAM, endpoint)
    }

    pub fn is_reconnect_eligible(&self) -> bool {
        is_reconnect_eligible(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_strerror_plus_endpoint() {
        let err = TransportError::new(codes::CONNECTION_REFUSED, "10.0.0.1:443");
        assert_eq!(err.message, "Connection refused 10.0.0.1:443");
        assert_eq!(err.code, 111);
    }

    #[test]
    fn eligible_codes() {
        assert!(is_reconnect_eligible(codes::EPIPE));
        assert!(is_reconnect_eligible(codes::CONNECTION_REFUSED));
        assert!(is_reconnect_eligible(codes::SESSION_CLOSED));
        assert!(!is_reconnect_eligible(codes::UNKNOWN_STREAM));
        assert!(!is_reconnect_eligible(1));
    }

    #[test]
    fn unknown_stream_helper() {
        let err = TransportError::unknown_stream("host:1234");
        assert_eq!(err.code, codes::UNKNOWN_STREAM);
        assert_eq!(err.message, "Unknown stream host:1234");
    }

    #[test]
    fn unrecognized_code_has_generic_message() {
        assert_eq!(strerror(999), "Transport error");
    }
}
