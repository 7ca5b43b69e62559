//! Wire primitives
//!
//! Everything on the wire is built from three primitives:
//! - QUIC-style variable-length integers (1, 2, 4 or 8 bytes)
//! - Fixed-width big-endian unsigned integers (1, 2, 3, 4 or 8 bytes)
//! - Length-prefixed UTF-8 strings (varint byte length + bytes)
//!
//! Encoding writes into any `bytes::BufMut`. Decoding reads from any
//! `tokio::io::AsyncRead`, since control messages and object headers are
//! consumed straight off a stream with no outer length prefix.

pub mod fixed;
pub mod string;
pub mod varint;

use std::io;

pub use fixed::{decode_uint, encode_uint};
pub use string::{decode_string, encode_string, MAX_STRING_LENGTH};
pub use varint::VarInt;

/// Error produced while encoding a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The value does not fit in the chosen width
    #[error("value {value} overflows a {width}-byte field")]
    Overflow {
        /// Width in bytes that was attempted
        width: usize,
        /// Offending value
        value: u64,
    },
}

/// Error produced while decoding a value
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The stream ended before the value was complete
    #[error("short read")]
    ShortRead,

    /// The bytes are structurally invalid
    #[error("malformed: {0}")]
    Malformed(String),

    /// Unknown control message tag
    #[error("unknown message type: {0:#x}")]
    UnknownMessage(u64),

    /// Underlying stream failure
    #[error("io error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => DecodeError::ShortRead,
            _ => DecodeError::Io(err),
        }
    }
}
