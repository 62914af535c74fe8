//! A multiplexed gRPC client core.
//!
//! This crate is the client-side runtime underneath generated gRPC stubs:
//! one [`Client`] owns a single HTTP/2 connection and fans its response
//! frames out to however many logical streams are open on it, reconnecting
//! (and coalescing concurrent reconnect attempts) when the peer resets the
//! connection. [`ClientPool`] sits one layer up, managing a bounded set of
//! `Client`s so callers never have to think about connection lifecycle at
//! all.
//!
//! Message encoding (protobuf, JSON, or anything else) is deliberately out
//! of scope — every call here moves a `Bytes` payload, already serialized,
//! and this crate handles only the gRPC envelope framing and the transport
//! underneath it.
//!
//! # Example
//!
//! ```ignore
//! use grpcmux_client::{Client, Encoding, Endpoint, HyperTransport, Mode};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = Endpoint::new("api.example.com", 443);
//!     let client = Client::new(
//!         endpoint.clone(),
//!         Mode::Unary,
//!         Default::default(),
//!         HyperTransport::new(endpoint),
//!     );
//!     client.connect().await?;
//!
//!     let stream_id = client
//!         .send("pkg.v1.Service/Method", request_bytes, Encoding::Proto)
//!         .await?;
//!     let (response, trailers) = client.recv(stream_id, Duration::from_secs(10)).await?;
//!     if !trailers.is_ok() {
//!         eprintln!("rpc failed: {}", trailers);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Pooling
//!
//! ```ignore
//! use grpcmux_client::{ClientPool, Endpoint, HyperClientFactory, Mode, PoolSettings};
//! use std::time::Duration;
//!
//! let pool = ClientPool::new(
//!     Endpoint::new("api.example.com", 443),
//!     HyperClientFactory::new(Mode::Unary),
//!     Default::default(),
//!     PoolSettings { size: 8, ..Default::default() },
//! );
//!
//! let client = pool.acquire(Duration::from_secs(1)).await.expect("pool exhausted");
//! // ... use `client` ...
//! pool.release(Some(client)).await;
//! ```
//!
//! # TLS
//!
//! [`HyperTransport`] defaults to TLS using the platform's trust roots
//! (`tls-native-roots`, on by default) or the bundled Mozilla roots
//! (`tls-webpki-roots`). Either can be combined with `tls-ring` (default) or
//! `tls-aws-lc` to pick the `rustls` crypto provider. Use
//! [`HyperTransport::plaintext`] for cleartext h2c against a local server.
//!
//! # Logging
//!
//! Enable the `tracing` feature to get `tracing::debug!`/`tracing::warn!`
//! events at connect/reconnect, stream teardown, and pool creation/drain —
//! off by default so a caller that doesn't use `tracing` doesn't pay for it.
//!
//! # Testing
//!
//! Every piece above the transport — framing, reconnect, the stream
//! registry, the pool — is tested against an in-process fake transport
//! rather than a real socket; see `transport::test_support::FakeTransport`
//! (test-only) for the pattern if you need to exercise your own code built
//! on top of [`Transport`].

mod client;
mod error;
mod factory;
mod pool;
mod settings;
pub mod transport;

pub use client::{Client, Mode};
pub use error::ClientError;
pub use factory::{ClientFactory, HyperClientFactory};
pub use pool::ClientPool;
pub use settings::{ClientSettings, PoolSettings};
pub use transport::{Encoding, Endpoint, HyperTransport, StreamId, Transport, TransportStats};

pub use grpcmux_core::{Code, Trailers};
pub use bytes::Bytes;
