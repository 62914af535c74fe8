//! Tunables for [`crate::Client`] and [`crate::ClientPool`].
//!
//! Both structs are plain, `serde`-serializable data — there is no bundled
//! loader (file/env/CLI). Callers construct them with `..Default::default()`
//! or build their own from whatever configuration layer their application
//! already uses.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-connection settings for a single [`crate::Client`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Wall-clock budget for `connect` and for the send-path's own internal
    /// retries; does not bound how long `recv` waits for a response (see
    /// `receive_timeout`).
    pub connect_timeout: Duration,

    /// Whether `send` should verify the connection is actually usable (by
    /// probing for a pending EOF on the socket) before reusing it, rather
    /// than discovering a dead peer only on write.
    pub open_eof_check: bool,

    /// Reject an outbound message larger than this many bytes rather than
    /// attempting to frame and send it.
    pub package_max_length: usize,

    /// Advertised `SETTINGS_MAX_CONCURRENT_STREAMS` for the HTTP/2 session.
    pub http2_max_concurrent_streams: u32,

    /// Advertised `SETTINGS_MAX_FRAME_SIZE` for the HTTP/2 session.
    pub http2_max_frame_size: u32,

    /// How many times the send path will reconnect-and-retry a single call
    /// before giving up (§4.1.2); each retry is gated on the error being
    /// reconnect-eligible.
    pub max_retries: u32,

    /// Force every `send` to reconnect first, bypassing the existing
    /// connection entirely. Mainly a testing knob.
    pub force_reconnect: bool,

    /// Per-`recv` timeout override. `None` means the caller passes a
    /// timeout to each `recv` call individually; `Some(Duration::ZERO)`
    /// means poll without blocking.
    pub receive_timeout: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            open_eof_check: true,
            package_max_length: 2 * 1024 * 1024,
            http2_max_concurrent_streams: 1000,
            http2_max_frame_size: 2 * 1024 * 1024,
            max_retries: 10,
            force_reconnect: false,
            receive_timeout: None,
        }
    }
}

/// Settings for a [`crate::ClientPool`], layered on top of the
/// [`ClientSettings`] each pooled connection is built with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of connections the pool will ever have outstanding
    /// (checked out plus idle) at once.
    pub size: usize,

    /// Applied to every connection the pool creates.
    pub force_reconnect: bool,

    /// Applied to every connection the pool creates.
    pub receive_timeout: Option<Duration>,

    /// Discard and rebuild a connection on release rather than returning it
    /// to the idle set — mainly a testing knob for exercising churn.
    pub force_recreate: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            size: 16,
            force_reconnect: false,
            receive_timeout: None,
            force_recreate: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_settings_defaults_match_documented_values() {
        let s = ClientSettings::default();
        assert_eq!(s.connect_timeout, Duration::from_secs(3));
        assert!(s.open_eof_check);
        assert_eq!(s.package_max_length, 2 * 1024 * 1024);
        assert_eq!(s.http2_max_concurrent_streams, 1000);
        assert_eq!(s.max_retries, 10);
        assert!(!s.force_reconnect);
        assert_eq!(s.receive_timeout, None);
    }

    #[test]
    fn pool_settings_defaults_match_documented_values() {
        let s = PoolSettings::default();
        assert_eq!(s.size, 16);
        assert!(!s.force_reconnect);
        assert!(!s.force_recreate);
    }

    #[test]
    fn client_settings_round_trips_through_json() {
        let s = ClientSettings {
            max_retries: 3,
            receive_timeout: Some(Duration::from_millis(250)),
            ..Default::default()
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: ClientSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
