//! Media container boundary
//!
//! The protocol does not care how samples are packed into object payloads.
//! This module defines the two seams where a container format plugs in:
//! - [`Demuxer`]: object payload bytes -> decoded [`Frame`]s
//! - [`Muxer`]: encoded sample -> payload bytes plus a group boundary
//!
//! [`RawCodec`] is a minimal length-prefixed framing that implements both,
//! used by the demo and tests.

pub mod raw;

use bytes::Bytes;

use crate::coding::{DecodeError, EncodeError};
use crate::timeline::{Frame, Sample, TrackRef};

pub use raw::RawCodec;

/// Container-framed bytes for one sample
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Bytes to append to an object payload
    pub data: Bytes,
    /// Whether this segment starts a new group (and so a new object)
    pub new_group: bool,
}

/// Turns object payloads into frames
pub trait Demuxer: Send + 'static {
    /// Frames contained in one payload, in decode order
    fn decode(&mut self, track: TrackRef, payload: Bytes) -> Result<Vec<Frame>, DecodeError>;
}

/// Turns encoded samples into payload segments
pub trait Muxer: Send {
    /// Frame one sample for transport
    fn encode(&mut self, sample: &Sample, timestamp: f64) -> Result<Segment, EncodeError>;
}
