//! The transport capability (§6.1 of the design) consumed by [`crate::Client`].
//!
//! `Transport` is the seam between the gRPC-shaped concerns this crate owns
//! (framing, stream registries, reconnect policy) and the HTTP/2 connection
//! itself. [`hyper_h2::HyperTransport`] is the production implementation;
//! tests substitute an in-memory fake that never touches a socket.

mod body;
mod connector;
mod hyper_h2;
/// In-memory [`Transport`] fake, also exported (behind the `test-support`
/// feature) for integration tests in `tests/` that need one without linking
/// a real socket.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use body::RequestBody;
pub use connector::{build_tls_config, default_tls_config, danger_accept_invalid_certs_config};
pub use hyper_h2::HyperTransport;

use bytes::Bytes;
use grpcmux_core::TransportError;
use http::HeaderMap;
use std::fmt;
use std::time::Duration;

/// A positive, Client-assigned identifier for one logical gRPC stream.
///
/// Distinct from the underlying transport's own HTTP/2 stream numbering
/// (see the glossary entry "Stream" in the design notes) — this id is what
/// `send` returns and what `recv`/`push` take as an argument.
pub type StreamId = i32;

/// `host:port`, as recorded on a [`crate::Client`] and echoed into
/// transport-error messages.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Protobuf or JSON — only affects the `content-type` header this core
/// emits. Serialization itself is the caller's responsibility (§1 Non-goals).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Proto,
    Json,
}

impl Encoding {
    pub fn content_type(self) -> &'static str {
        match self {
            Encoding::Proto => "application/grpc+proto",
            Encoding::Json => "application/grpc+json",
        }
    }
}

/// A fully-built outbound request, ready for [`Transport::send`].
#[derive(Clone, Debug)]
pub struct OutboundRequest {
    /// e.g. `/pkg.Service/Method`.
    pub method: String,
    /// The envelope-framed first chunk of the request body.
    pub body: Bytes,
    pub encoding: Encoding,
    /// `true` if this chunk ends the request stream (UNARY mode always
    /// sets this; STREAMING mode only sets it when the first `push` also
    /// happens to be the last).
    pub end_of_stream: bool,
}

/// One inbound event delivered by the transport: a response frame for some
/// stream, and whether it's the last one.
#[derive(Clone, Debug)]
pub struct InboundFrame {
    pub stream_id: StreamId,
    /// Raw envelope bytes (flag + length + payload) as received; the
    /// receiver task strips the 5-octet header.
    pub data: Bytes,
    /// `true` while more frames are expected on this stream (server
    /// streaming); `false` marks end-of-stream.
    pub pipeline: bool,
    /// Trailers, populated once `pipeline` is `false`.
    pub headers: HeaderMap,
}

/// Pass-through counters a transport can expose; intentionally sparse since
/// the underlying HTTP/2 stack owns the real metrics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransportStats {
    pub streams_opened: u64,
    pub streams_closed: u64,
    pub reconnects: u64,
}

/// The capability a [`crate::Client`] needs from its HTTP/2 connection.
///
/// Implementors own exactly one underlying connection; reconnecting means
/// tearing down and re-establishing that connection, not switching to a
/// different one (that's the pool's job, one layer up).
pub trait Transport: Send + Sync + 'static {
    /// Establish the HTTP/2 session. Idempotent only in the sense that
    /// calling it again after [`Transport::close`] re-establishes a fresh
    /// connection; calling it while already connected is undefined and the
    /// `Client` never does so.
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Submit `req`; returns the assigned stream id on success.
    fn send(&self, req: OutboundRequest) -> impl Future<Output = Result<StreamId, TransportError>> + Send;

    /// Write an additional envelope-framed chunk on an already-open stream.
    fn write(
        &self,
        stream_id: StreamId,
        data: Bytes,
        end_of_stream: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Block for up to `timeout` for the next inbound frame, in UNARY mode.
    fn recv(&self, timeout: Duration) -> impl Future<Output = Option<InboundFrame>> + Send;

    /// Block for up to `timeout` for the next inbound frame, in STREAMING
    /// mode. Distinct from [`Transport::recv`] only because the source
    /// this core ports exposes two read primitives depending on call mode;
    /// implementations are free to treat them identically.
    fn read(&self, timeout: Duration) -> impl Future<Output = Option<InboundFrame>> + Send {
        self.recv(timeout)
    }

    /// Tear down the connection. Idle after this call until `connect` is
    /// invoked again.
    fn close(&self) -> impl Future<Output = ()> + Send;

    fn stats(&self) -> TransportStats;
}
