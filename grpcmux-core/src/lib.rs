//! Wire-level primitives shared by a multiplexed gRPC client core.
//!
//! This crate has no I/O of its own: it's the status codes, trailers, and
//! envelope framing that `grpcmux-client` builds its `Client`/`ClientPool`
//! on top of, kept separate so the framing and error vocabulary can be
//! tested (and reused) without pulling in an HTTP/2 stack.

mod code;
mod error;
mod frame;
mod trailers;

pub use code::Code;
pub use error::{codes, is_reconnect_eligible, strerror, TransportError};
pub use frame::{decode, encode, strip_header, FrameError, HEADER_LEN};
pub use trailers::Trailers;
