//! Minimal sample framing
//!
//! ```text
//! +----------------+----------+------------+-----------+
//! | timestamp (64) | flags (8)| length (32)| data ...  |
//! +----------------+----------+------------+-----------+
//! ```
//!
//! Timestamps are microseconds. Bit 0 of `flags` marks a sync sample.
//! An object payload is any number of these back to back. Every sync
//! sample starts a new group.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::coding::{encode_uint, DecodeError, EncodeError};
use crate::timeline::{Frame, Sample, TrackRef};

use super::{Demuxer, Muxer, Segment};

const HEADER_SIZE: usize = 8 + 1 + 4;
const FLAG_SYNC: u8 = 0x01;

/// Length-prefixed sample framing
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl RawCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Muxer for RawCodec {
    fn encode(&mut self, sample: &Sample, timestamp: f64) -> Result<Segment, EncodeError> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(EncodeError::Overflow {
                width: 8,
                value: u64::MAX,
            });
        }

        let micros = (timestamp * 1_000_000.0).round() as u64;
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + sample.data.len());

        encode_uint(&mut buf, micros, 8)?;
        buf.put_u8(if sample.is_sync { FLAG_SYNC } else { 0 });
        encode_uint(&mut buf, sample.data.len() as u64, 4)?;
        buf.put_slice(&sample.data);

        Ok(Segment {
            data: buf.freeze(),
            new_group: sample.is_sync,
        })
    }
}

impl Demuxer for RawCodec {
    fn decode(&mut self, track: TrackRef, mut payload: Bytes) -> Result<Vec<Frame>, DecodeError> {
        let mut frames = Vec::new();

        while payload.has_remaining() {
            if payload.remaining() < HEADER_SIZE {
                return Err(DecodeError::ShortRead);
            }

            let micros = payload.get_u64();
            let flags = payload.get_u8();
            let len = payload.get_u32() as usize;

            if payload.remaining() < len {
                return Err(DecodeError::ShortRead);
            }

            frames.push(Frame {
                track,
                sample: Sample {
                    is_sync: flags & FLAG_SYNC != 0,
                    data: payload.split_to(len),
                },
                timestamp: micros as f64 / 1_000_000.0,
            });
        }

        Ok(frames)
    }
}
