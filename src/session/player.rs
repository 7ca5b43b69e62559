//! Playback driver
//!
//! Feeds subscribed tracks into a [`TimelineSync`] and hands frames to a
//! renderer together with their wall-clock presentation time.
//!
//! ```text
//! TrackReader ──object──▶ read task ──payload──▶ demux task ──frames──▶ TimelineSync
//!                         (one per object)                                  │
//!                                                        next(kind) ◀───────┘
//! ```
//!
//! Payloads are read concurrently, so frames from different objects reach
//! the timeline in any order. The timeline sorts them.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::media::Demuxer;
use crate::object::ObjectHeader;
use crate::timeline::{
    Clock, Frame, MediaKind, SystemClock, TimelineConfig, TimelineSync, TrackRef,
};
use crate::transport::RecvStream;

use super::track::TrackReader;

/// Payloads in flight between the read tasks and the demux task
const PAYLOAD_QUEUE: usize = 16;

/// A frame ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub frame: Frame,
    /// When the frame should be shown, in clock seconds
    pub wall_time: f64,
    /// Renderers reset their state whenever this changes
    pub continuity: u64,
}

/// Shared playback state
#[derive(Debug, Clone)]
pub struct Player {
    timeline: Arc<Mutex<TimelineSync>>,
    /// Why the session behind an ingested track closed
    closed: Arc<Mutex<Option<String>>>,
}

impl Player {
    /// Create a player on the system clock
    pub fn new(config: &TimelineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a player on the given clock
    pub fn with_clock(config: &TimelineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            timeline: Arc::new(Mutex::new(TimelineSync::with_clock(config, clock))),
            closed: Arc::new(Mutex::new(None)),
        }
    }

    /// Feed every object of `track` into the timeline as `kind` frames
    ///
    /// The task ends when the track ends, and the session's close reason
    /// is then available from [`Player::closed`]. An object that fails to
    /// read or demux is skipped.
    pub fn ingest<R, D>(
        &self,
        mut track: TrackReader<R>,
        kind: MediaKind,
        mut demuxer: D,
    ) -> JoinHandle<()>
    where
        R: RecvStream,
        D: Demuxer,
    {
        let timeline = Arc::clone(&self.timeline);
        let track_ref = TrackRef::new(track.id(), kind);
        let closed = Arc::clone(&self.closed);
        let (payload_tx, mut payload_rx) =
            mpsc::channel::<(ObjectHeader, Result<Bytes>)>(PAYLOAD_QUEUE);

        tokio::spawn(async move {
            while let Some(mut object) = track.next_object().await {
                let payload_tx = payload_tx.clone();
                tokio::spawn(async move {
                    let payload = object.read_to_end().await;
                    let _ = payload_tx.send((object.header, payload)).await;
                });
            }

            let reason = track
                .close_reason()
                .unwrap_or_else(|| "track ended".to_string());
            tracing::warn!(track = %track.name(), reason = %reason, "Track ended");
            closed.lock().await.get_or_insert(reason);
        });

        tokio::spawn(async move {
            while let Some((header, payload)) = payload_rx.recv().await {
                let payload = match payload {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(
                            track = header.track,
                            group = header.group,
                            error = %e,
                            "Skipping object"
                        );
                        continue;
                    }
                };

                let frames = match demuxer.decode(track_ref, payload) {
                    Ok(frames) => frames,
                    Err(e) => {
                        tracing::warn!(
                            track = header.track,
                            group = header.group,
                            error = %e,
                            "Failed to demux object"
                        );
                        continue;
                    }
                };

                let mut timeline = timeline.lock().await;
                for frame in frames {
                    timeline.push(frame);
                }
            }
        })
    }

    /// Push one frame directly
    pub async fn push(&self, frame: Frame) {
        self.timeline.lock().await.push(frame);
    }

    /// Start playback once `target` seconds are buffered on both tracks
    pub async fn play(&self, target: f64) {
        self.timeline.lock().await.play(target);
    }

    /// Jump both tracks to `timestamp`
    pub async fn seek(&self, timestamp: f64) {
        self.timeline.lock().await.seek(timestamp);
    }

    /// Next frame of `kind` with its presentation time
    ///
    /// Returns `None` before playback starts or when the track ran dry.
    pub async fn next(&self, kind: MediaKind) -> Option<Presentation> {
        let mut timeline = self.timeline.lock().await;
        let frame = timeline.next(kind)?;
        let wall_time = timeline.sync(frame.timestamp)?;

        Some(Presentation {
            frame,
            wall_time,
            continuity: timeline.continuity(),
        })
    }

    /// Jointly buffered span
    pub async fn span(&self) -> Option<(f64, f64)> {
        self.timeline.lock().await.span()
    }

    /// Current continuity counter
    pub async fn continuity(&self) -> u64 {
        self.timeline.lock().await.continuity()
    }

    /// Frames buffered for one media type
    pub async fn frame_count(&self, kind: MediaKind) -> usize {
        let timeline = self.timeline.lock().await;
        match kind {
            MediaKind::Audio => timeline.audio().len(),
            MediaKind::Video => timeline.video().len(),
        }
    }

    /// Why playback lost its source, once an ingested track has ended
    ///
    /// Tracks only end when their session closes, so this separates a
    /// closed session from a buffer that simply ran dry.
    pub async fn closed(&self) -> Option<String> {
        self.closed.lock().await.clone()
    }

    /// Check if playback has started
    pub async fn is_playing(&self) -> bool {
        self.timeline.lock().await.is_playing()
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(&TimelineConfig::default())
    }
}
