//! Audio/video playback timeline
//!
//! Combines an audio and a video [`Component`] into one timeline that
//! starts playing once both have buffered enough, and maps media
//! timestamps to wall-clock time.
//!
//! Playback start and explicit seeks share one path: both reset the
//! playheads, re-anchor the wall clock and bump the continuity counter.
//! Renderers must reset their own state whenever the counter changes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::component::Component;
use super::config::TimelineConfig;
use super::frame::{Frame, MediaKind};

/// Source of wall-clock time in seconds
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> f64;
}

/// Wall clock as seconds since the UNIX epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(now: f64) -> Self {
        Self {
            bits: AtomicU64::new(now.to_bits()),
        }
    }

    pub fn set(&self, now: f64) {
        self.bits.store(now.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, delta: f64) {
        self.set(self.now() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Jointly buffered audio/video timeline
pub struct TimelineSync {
    audio: Component,
    video: Component,
    /// Wall-clock time of media timestamp zero
    anchor: Option<f64>,
    /// Buffered duration required before playback starts
    target: Option<f64>,
    /// Incremented on every seek
    continuity: u64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TimelineSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineSync")
            .field("audio", &self.audio.span())
            .field("video", &self.video.span())
            .field("anchor", &self.anchor)
            .field("target", &self.target)
            .field("continuity", &self.continuity)
            .finish()
    }
}

impl TimelineSync {
    /// Create a timeline with default configuration and the system clock
    pub fn new() -> Self {
        Self::with_clock(&TimelineConfig::default(), Arc::new(SystemClock))
    }

    /// Create a timeline with the given configuration and clock
    pub fn with_clock(config: &TimelineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            audio: Component::with_config(config),
            video: Component::with_config(config),
            anchor: None,
            target: None,
            continuity: 0,
            clock,
        }
    }

    /// Route a frame to its component and try to start playback
    pub fn push(&mut self, frame: Frame) {
        match frame.kind() {
            MediaKind::Audio => self.audio.push(frame),
            MediaKind::Video => self.video.push(frame),
        };

        self.try_start();
    }

    /// Request playback once `target` seconds are buffered on both tracks
    pub fn play(&mut self, target: f64) {
        self.target = Some(target);
        self.try_start();
    }

    fn try_start(&mut self) {
        let target = match self.target {
            Some(target) => target,
            None => return,
        };

        let (start, end) = match self.span() {
            Some(span) => span,
            None => return,
        };

        if end - start < target {
            return;
        }

        let timestamp = end - target;
        self.target = None;
        self.seek(timestamp);

        tracing::info!(
            timestamp = timestamp,
            buffered = end - start,
            "Playback started"
        );
    }

    /// Jump both tracks to `timestamp` and re-anchor the wall clock
    pub fn seek(&mut self, timestamp: f64) {
        self.audio.reset(timestamp);
        self.video.reset(timestamp);

        self.anchor = Some(self.clock.now() - timestamp);
        self.continuity += 1;

        tracing::debug!(
            timestamp = timestamp,
            continuity = self.continuity,
            "Timeline seek"
        );
    }

    /// Wall-clock time at which `pts` should be presented
    pub fn sync(&self, pts: f64) -> Option<f64> {
        self.anchor.map(|anchor| pts + anchor)
    }

    /// Number of discontinuities so far
    pub fn continuity(&self) -> u64 {
        self.continuity
    }

    /// Timestamp range buffered on both tracks
    ///
    /// `None` until both tracks have frames, or when their ranges do not
    /// overlap.
    pub fn span(&self) -> Option<(f64, f64)> {
        let (audio_start, audio_end) = self.audio.span()?;
        let (video_start, video_end) = self.video.span()?;

        let start = audio_start.max(video_start);
        let end = audio_end.min(video_end);
        if end < start {
            return None;
        }
        Some((start, end))
    }

    /// Whether playback has started
    pub fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    /// Next frame to present for one media type
    pub fn next(&mut self, kind: MediaKind) -> Option<Frame> {
        match kind {
            MediaKind::Audio => self.audio.next(),
            MediaKind::Video => self.video.next(),
        }
    }

    pub fn audio(&self) -> &Component {
        &self.audio
    }

    pub fn video(&self) -> &Component {
        &self.video
    }
}

impl Default for TimelineSync {
    fn default() -> Self {
        Self::new()
    }
}
