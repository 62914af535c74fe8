//! The gRPC length-prefixed message envelope.
//!
//! Every message on the wire — request or response — is prefixed by one
//! octet of compression flag followed by a big-endian `u32` length:
//!
//! ```text
//! [compressed:1][length:4][payload:length]
//! ```
//!
//! This core never compresses (the flag is always `0`); it still validates
//! the flag on decode so a compressed frame from a server we don't support
//! fails loudly instead of being misread as payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the envelope header: 1 flag octet + 4 length octets.
pub const HEADER_LEN: usize = 5;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("incomplete envelope header: need {HEADER_LEN} bytes, have {0}")]
    IncompleteHeader(usize),
    #[error("incomplete envelope body: need {expected} bytes, have {actual}")]
    IncompleteBody { expected: usize, actual: usize },
    #[error("compressed frame (flag=0x{0:02x}) but this core does not support compression")]
    Compressed(u8),
}

/// Encode `payload` as a single gRPC envelope: flag byte `0` + big-endian
/// length + the payload itself.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(0);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Parse a complete envelope out of `buf`, returning the payload slice.
///
/// `buf` must contain *exactly* one frame (header + body); use this when the
/// transport already delineates message boundaries (as gRPC-over-HTTP/2
/// does — one DATA sequence per message).
pub fn decode(buf: &[u8]) -> Result<Bytes, FrameError> {
    if buf.len() < HEADER_LEN {
        return Err(FrameError::IncompleteHeader(buf.len()));
    }
    let flag = buf[0];
    if flag != 0 {
        return Err(FrameError::Compressed(flag));
    }
    let mut len_bytes = &buf[1..HEADER_LEN];
    let length = len_bytes.get_u32() as usize;
    let body = &buf[HEADER_LEN..];
    if body.len() != length {
        return Err(FrameError::IncompleteBody {
            expected: length,
            actual: body.len(),
        });
    }
    Ok(Bytes::copy_from_slice(body))
}

/// Strip the 5-octet header from `buf` and return the remaining payload,
/// without checking that the declared length matches what's left — used
/// when the caller (e.g. the receiver task) has already validated framing
/// via [`decode`] and only needs the bytes.
pub fn strip_header(buf: &[u8]) -> Option<&[u8]> {
    buf.get(HEADER_LEN..)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for payload in [&b""[..], b"world", &vec![7u8; 10_000]] {
            let framed = encode(payload);
            assert_eq!(framed.len(), payload.len() + HEADER_LEN);
            assert_eq!(decode(&framed).unwrap(), Bytes::copy_from_slice(payload));
        }
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let framed = encode(b"world");
        assert_eq!(&framed[1..5], &5u32.to_be_bytes());
    }

    #[test]
    fn literal_scenario_one_wire_bytes() {
        let wire = b"\x00\x00\x00\x00\x05world";
        assert_eq!(decode(wire).unwrap(), Bytes::from_static(b"world"));
    }

    #[test]
    fn rejects_compressed_flag() {
        let mut framed = encode(b"x").to_vec();
        framed[0] = 1;
        assert_eq!(decode(&framed), Err(FrameError::Compressed(1)));
    }

    #[test]
    fn rejects_short_header() {
        assert_eq!(decode(&[0, 0]), Err(FrameError::IncompleteHeader(2)));
    }

    #[test]
    fn rejects_truncated_body() {
        let framed = encode(b"hello");
        assert!(matches!(
            decode(&framed[..framed.len() - 1]),
            Err(FrameError::IncompleteBody { .. })
        ));
    }
}
