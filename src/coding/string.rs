//! Length-prefixed UTF-8 strings

use bytes::BufMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{DecodeError, EncodeError, VarInt};

/// Longest string a decoder will allocate for (64KB)
pub const MAX_STRING_LENGTH: usize = 64 * 1024;

/// Encode a varint byte length followed by the UTF-8 bytes
pub fn encode_string<B: BufMut>(buf: &mut B, s: &str) -> Result<(), EncodeError> {
    VarInt::try_from(s.len())?.encode(buf);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Decode a length-prefixed string, rejecting lengths above `max_len`
pub async fn decode_string<R: AsyncRead + Unpin>(
    r: &mut R,
    max_len: usize,
) -> Result<String, DecodeError> {
    let len = VarInt::decode(r).await?.into_inner();
    if len > max_len as u64 {
        return Err(DecodeError::Malformed(format!(
            "string length {} exceeds {}",
            len, max_len
        )));
    }

    let mut bytes = vec![0u8; len as usize];
    r.read_exact(&mut bytes).await?;

    String::from_utf8(bytes).map_err(|e| DecodeError::Malformed(format!("invalid utf-8: {}", e)))
}
