//! gRPC status codes.
//!
//! These mirror the standard gRPC status codes (and, not coincidentally, the
//! Connect protocol's codes, which borrow the same set). A `Code` is what
//! travels in the `grpc-status` trailer as its ASCII decimal value.

use std::fmt;

/// A gRPC status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Code {
    #[default]
    Ok = 0,
    Canceled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Parse a code from the decimal string found in a `grpc-status` header.
    ///
    /// Unrecognized values map to [`Code::Unknown`] rather than failing —
    /// a server is always free to send a status this client doesn't know yet.
    pub fn from_header(s: &str) -> Self {
        match s.trim().parse::<u8>() {
            Ok(0) => Code::Ok,
            Ok(1) => Code::Canceled,
            Ok(2) => Code::Unknown,
            Ok(3) => Code::InvalidArgument,
            Ok(4) => Code::DeadlineExceeded,
            Ok(5) => Code::NotFound,
            Ok(6) => Code::AlreadyExists,
            Ok(7) => Code::PermissionDenied,
            Ok(8) => Code::ResourceExhausted,
            Ok(9) => Code::FailedPrecondition,
            Ok(10) => Code::Aborted,
            Ok(11) => Code::OutOfRange,
            Ok(12) => Code::Unimplemented,
            Ok(13) => Code::Internal,
            Ok(14) => Code::Unavailable,
            Ok(15) => Code::DataLoss,
            Ok(16) => Code::Unauthenticated,
            _ => Code::Unknown,
        }
    }

    /// The ASCII decimal value written into the `grpc-status` header.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_header_string() {
        for code in [
            Code::Ok,
            Code::DeadlineExceeded,
            Code::Unavailable,
            Code::Unauthenticated,
        ] {
            let header = code.to_string();
            assert_eq!(Code::from_header(&header), code);
        }
    }

    #[test]
    fn unrecognized_value_is_unknown() {
        assert_eq!(Code::from_header("97"), Code::Unknown);
        assert_eq!(Code::from_header("not-a-number"), Code::Unknown);
    }

    #[test]
    fn default_is_ok() {
        assert_eq!(Code::default(), Code::Ok);
        assert_eq!(Code::default().as_u8(), 0);
    }
}
