//! Object header
//!
//! Every unidirectional stream starts with this header; the rest of the
//! stream is the payload.
//!
//! ```text
//! +-----------+-----------+--------------+--------------+----------
//! | track (i) | group (i) | sequence (i) | priority (32)| payload ...
//! +-----------+-----------+--------------+--------------+----------
//! ```
//!
//! `priority` is a big-endian `u32` scheduling hint (lower is sent/kept
//! first). It has no bearing on how the receiver interprets the object.

use bytes::BufMut;
use tokio::io::AsyncRead;

use crate::coding::{decode_uint, encode_uint, DecodeError, EncodeError, VarInt};

const PRIORITY_WIDTH: usize = 4;

/// Identity and scheduling hint for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHeader {
    /// Subscription id of the track
    pub track: u64,
    /// Independently decodable unit within the track
    pub group: u64,
    /// Order within the group
    pub sequence: u64,
    /// Send/drop hint, lower first
    pub priority: u32,
}

impl ObjectHeader {
    /// Create a header
    pub fn new(track: u64, group: u64, sequence: u64, priority: u32) -> Self {
        Self {
            track,
            group,
            sequence,
            priority,
        }
    }

    /// Encode the header
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<(), EncodeError> {
        VarInt::try_from(self.track)?.encode(buf);
        VarInt::try_from(self.group)?.encode(buf);
        VarInt::try_from(self.sequence)?.encode(buf);
        encode_uint(buf, self.priority as u64, PRIORITY_WIDTH)
    }

    /// Decode a header from the start of a stream
    pub async fn decode<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self, DecodeError> {
        let track = VarInt::decode(r).await?.into_inner();
        let group = VarInt::decode(r).await?.into_inner();
        let sequence = VarInt::decode(r).await?.into_inner();
        let priority = decode_uint(r, PRIORITY_WIDTH).await? as u32;

        Ok(Self {
            track,
            group,
            sequence,
            priority,
        })
    }
}
