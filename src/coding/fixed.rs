//! Fixed-width big-endian unsigned integers
//!
//! Used for fields whose width is part of the format rather than chosen by
//! value, such as the object priority.

use bytes::BufMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{DecodeError, EncodeError};

/// Widths supported by `encode_uint`/`decode_uint`
pub const WIDTHS: [usize; 5] = [1, 2, 3, 4, 8];

/// Encode `value` as exactly `width` big-endian bytes
pub fn encode_uint<B: BufMut>(buf: &mut B, value: u64, width: usize) -> Result<(), EncodeError> {
    if !WIDTHS.contains(&width) {
        return Err(EncodeError::Overflow { width, value });
    }

    if width < 8 && value >> (width * 8) != 0 {
        return Err(EncodeError::Overflow { width, value });
    }

    let bytes = value.to_be_bytes();
    buf.put_slice(&bytes[8 - width..]);
    Ok(())
}

/// Decode exactly `width` big-endian bytes
pub async fn decode_uint<R: AsyncRead + Unpin>(
    r: &mut R,
    width: usize,
) -> Result<u64, DecodeError> {
    if !WIDTHS.contains(&width) {
        return Err(DecodeError::Malformed(format!("unsupported width {}", width)));
    }

    let mut bytes = [0u8; 8];
    r.read_exact(&mut bytes[8 - width..]).await?;
    Ok(u64::from_be_bytes(bytes))
}
