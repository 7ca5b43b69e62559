//! Decoded frame types
//!
//! Frames are produced by the demuxer from object payloads and consumed by
//! the timeline. They are cheap to clone: the sample bytes are reference
//! counted.

use bytes::Bytes;

/// Media type of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Reference to the track a frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackRef {
    /// Subscription id
    pub id: u64,
    /// Media type
    pub kind: MediaKind,
}

impl TrackRef {
    pub fn new(id: u64, kind: MediaKind) -> Self {
        Self { id, kind }
    }
}

/// Raw sample bytes plus the sync flag
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Whether decoding can start at this sample (keyframe)
    pub is_sync: bool,
    /// Encoded sample data
    pub data: Bytes,
}

/// A decoded media sample with its presentation timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub track: TrackRef,
    pub sample: Sample,
    /// Presentation timestamp in seconds
    pub timestamp: f64,
}

impl Frame {
    /// Create an audio frame; every audio sample is a sync point
    pub fn audio(track: u64, timestamp: f64, data: Bytes) -> Self {
        Self {
            track: TrackRef::new(track, MediaKind::Audio),
            sample: Sample {
                is_sync: true,
                data,
            },
            timestamp,
        }
    }

    /// Create a video frame
    pub fn video(track: u64, timestamp: f64, data: Bytes, is_keyframe: bool) -> Self {
        Self {
            track: TrackRef::new(track, MediaKind::Video),
            sample: Sample {
                is_sync: is_keyframe,
                data,
            },
            timestamp,
        }
    }

    /// Media type of the owning track
    pub fn kind(&self) -> MediaKind {
        self.track.kind
    }

    /// Whether decoding can start at this frame
    pub fn is_sync(&self) -> bool {
        self.sample.is_sync
    }
}
