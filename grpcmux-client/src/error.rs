//! Client-side error types.
//!
//! A gRPC application status (`grpc-status` / `grpc-message`) is never an
//! `Err` here — it travels back as [`grpcmux_core::Trailers`] alongside the
//! response payload, and it's the caller's job to decide what a non-zero
//! status means. [`ClientError`] is reserved for failures *below* that layer:
//! the transport, or this crate's own bookkeeping.

use grpcmux_core::{Code, TransportError};

use crate::transport::StreamId;

/// Failures a [`crate::Client`] call can produce that aren't a gRPC status.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// The underlying HTTP/2 connection failed. Carries the original
    /// transport error so callers can inspect [`TransportError::code`] (and
    /// [`TransportError::is_reconnect_eligible`]) directly.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `recv`/`push` referenced a stream id this client never registered,
    /// or that has already been torn down.
    #[error("stream {stream_id} is not registered on this client")]
    UnknownStream { stream_id: StreamId },

    /// The client was closed and can no longer be used.
    #[error("client is closed")]
    Closed,
}

impl ClientError {
    /// The gRPC status code this error would surface as, had it come back
    /// in trailers instead. `Transport` errors map to `Unavailable` since
    /// that's the closest standard code for "couldn't reach the peer".
    pub fn code(&self) -> Code {
        match self {
            ClientError::Transport(_) => Code::Unavailable,
            ClientError::UnknownStream { .. } => Code::Internal,
            ClientError::Closed => Code::Unavailable,
        }
    }

    /// Whether the send path should pay to reconnect and retry after this
    /// error, per the same rule [`TransportError::is_reconnect_eligible`]
    /// applies at the transport layer.
    pub fn is_reconnect_eligible(&self) -> bool {
        matches!(self, ClientError::Transport(e) if e.is_reconnect_eligible())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpcmux_core::codes;

    #[test]
    fn transport_error_maps_to_unavailable() {
        let err = ClientError::Transport(TransportError::new(codes::CONNECTION_REFUSED, "h:1"));
        assert_eq!(err.code(), Code::Unavailable);
    }

    #[test]
    fn unknown_stream_maps_to_internal() {
        let err = ClientError::UnknownStream { stream_id: 7 };
        assert_eq!(err.code(), Code::Internal);
    }

    #[test]
    fn reconnect_eligibility_passes_through_transport_error() {
        let eligible = ClientError::Transport(TransportError::new(codes::EPIPE, "h:1"));
        assert!(eligible.is_reconnect_eligible());

        let not_eligible = ClientError::Transport(TransportError::unknown_stream("h:1"));
        assert!(!not_eligible.is_reconnect_eligible());

        assert!(!ClientError::Closed.is_reconnect_eligible());
    }
}
