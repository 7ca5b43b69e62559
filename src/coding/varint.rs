//! Variable-length integer encoding
//!
//! The two high bits of the first byte select the total length:
//!
//! ```text
//! 00 -> 1 byte,   6 value bits  (0 ..= 63)
//! 01 -> 2 bytes, 14 value bits  (0 ..= 16383)
//! 10 -> 4 bytes, 30 value bits  (0 ..= 1073741823)
//! 11 -> 8 bytes, 62 value bits  (0 ..= 2^62 - 1)
//! ```
//!
//! All forms are big-endian. Encoders always pick the smallest form.

use std::fmt;

use bytes::BufMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{DecodeError, EncodeError};

/// A non-negative integer that fits in 62 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarInt(u64);

impl VarInt {
    /// Largest encodable value (2^62 - 1)
    pub const MAX: VarInt = VarInt((1 << 62) - 1);

    /// Zero
    pub const ZERO: VarInt = VarInt(0);

    /// Create from a `u32`, which always fits
    pub const fn from_u32(value: u32) -> Self {
        Self(value as u64)
    }

    /// Get the inner value
    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// Number of bytes this value occupies on the wire
    pub const fn size(self) -> usize {
        if self.0 < (1 << 6) {
            1
        } else if self.0 < (1 << 14) {
            2
        } else if self.0 < (1 << 30) {
            4
        } else {
            8
        }
    }

    /// Encode using the minimal form
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match self.size() {
            1 => buf.put_u8(self.0 as u8),
            2 => buf.put_u16(0b01 << 14 | self.0 as u16),
            4 => buf.put_u32(0b10 << 30 | self.0 as u32),
            _ => buf.put_u64(0b11 << 62 | self.0),
        }
    }

    /// Decode one varint from a stream
    pub async fn decode<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self, DecodeError> {
        let first = r.read_u8().await?;
        let tag = first >> 6;
        let mut value = (first & 0b0011_1111) as u64;

        let remaining = (1usize << tag) - 1;
        let mut rest = [0u8; 7];
        r.read_exact(&mut rest[..remaining]).await?;

        for byte in &rest[..remaining] {
            value = (value << 8) | *byte as u64;
        }

        Ok(Self(value))
    }
}

impl TryFrom<u64> for VarInt {
    type Error = EncodeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value <= Self::MAX.0 {
            Ok(Self(value))
        } else {
            Err(EncodeError::Overflow { width: 8, value })
        }
    }
}

impl TryFrom<usize> for VarInt {
    type Error = EncodeError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::try_from(value as u64)
    }
}

impl From<u32> for VarInt {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl From<VarInt> for u64 {
    fn from(value: VarInt) -> Self {
        value.0
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        VarInt::try_from(value).unwrap().encode(&mut buf);
        buf
    }

    async fn decode(bytes: &[u8]) -> Result<u64, DecodeError> {
        let mut r = bytes;
        VarInt::decode(&mut r).await.map(u64::from)
    }

    #[tokio::test]
    async fn test_boundaries_roundtrip_with_minimal_width() {
        let cases: [(u64, usize); 8] = [
            (0, 1),
            (63, 1),
            (64, 2),
            (16383, 2),
            (16384, 4),
            (1_073_741_823, 4),
            (1_073_741_824, 8),
            (VarInt::MAX.into_inner(), 8),
        ];

        for (value, width) in cases {
            let bytes = encode(value);
            assert_eq!(bytes.len(), width, "width for {}", value);
            assert_eq!(decode(&bytes).await.unwrap(), value);
        }
    }

    #[test]
    fn test_known_encodings() {
        // Examples from the QUIC varint definition
        assert_eq!(encode(37), vec![0x25]);
        assert_eq!(encode(15293), vec![0x7b, 0xbd]);
        assert_eq!(encode(494_878_333), vec![0x9d, 0x7f, 0x3e, 0x7d]);
        assert_eq!(
            encode(151_288_809_941_952_652),
            vec![0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]
        );
    }

    #[tokio::test]
    async fn test_non_minimal_encoding_still_decodes() {
        // 37 in the 2-byte form
        assert_eq!(decode(&[0x40, 0x25]).await.unwrap(), 37);
    }

    #[test]
    fn test_overflow() {
        let err = VarInt::try_from(1u64 << 62).unwrap_err();
        assert_eq!(
            err,
            EncodeError::Overflow {
                width: 8,
                value: 1 << 62
            }
        );
    }

    #[tokio::test]
    async fn test_short_read() {
        assert!(matches!(decode(&[]).await, Err(DecodeError::ShortRead)));
        assert!(matches!(decode(&[0x80, 0x01]).await, Err(DecodeError::ShortRead)));
    }
}
