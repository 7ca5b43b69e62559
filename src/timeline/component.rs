//! Single-track jitter buffer
//!
//! Frames for one media type, sorted by timestamp, with a playhead that
//! points at the next frame to present.
//!
//! Objects travel on independent streams, so frames can arrive out of
//! order. Insertion keeps the buffer sorted and shifts the playhead along
//! with the frames it points at:
//!
//! ```text
//! before:  [0] [1] [3] [4]        playhead -> 3 (index 2)
//! push 2:  [0] [1] [2] [3] [4]    playhead -> 3 (index 3)
//! ```
//!
//! Frames older than `capacity` seconds behind the newest frame are evicted
//! from the front (or dropped on arrival).

use std::collections::VecDeque;

use super::config::TimelineConfig;
use super::frame::Frame;

/// Time-ordered frame buffer with a playhead
#[derive(Debug)]
pub struct Component {
    /// Frames sorted by ascending timestamp
    frames: VecDeque<Frame>,
    /// Maximum span between oldest and newest timestamp
    capacity: f64,
    /// Index of the next frame to present
    playhead: Option<usize>,
}

impl Component {
    /// Create a component with the default capacity (10 seconds)
    pub fn new() -> Self {
        Self::with_config(&TimelineConfig::default())
    }

    /// Create a component from configuration
    pub fn with_config(config: &TimelineConfig) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity: config.capacity,
            playhead: None,
        }
    }

    /// Insert a frame in timestamp order
    ///
    /// Returns false if the frame was discarded because it is already
    /// outside the retention window.
    pub fn push(&mut self, frame: Frame) -> bool {
        if !frame.timestamp.is_finite() {
            tracing::warn!(timestamp = frame.timestamp, "Discarding frame with invalid timestamp");
            return false;
        }

        let newest = match self.frames.back() {
            Some(last) => last.timestamp,
            None => {
                self.frames.push_back(frame);
                return true;
            }
        };

        if frame.timestamp >= newest {
            // Fast path: in-order arrival
            self.frames.push_back(frame);
        } else {
            if newest - frame.timestamp > self.capacity {
                tracing::trace!(
                    timestamp = frame.timestamp,
                    newest = newest,
                    "Discarding stale frame"
                );
                return false;
            }

            // Before the first frame with an equal or greater timestamp
            let index = self
                .frames
                .partition_point(|f| f.timestamp < frame.timestamp);
            self.frames.insert(index, frame);

            if let Some(playhead) = self.playhead.as_mut() {
                if *playhead >= index {
                    *playhead += 1;
                }
            }
        }

        self.evict();
        true
    }

    /// Drop frames from the front until the span fits the capacity
    fn evict(&mut self) {
        let newest = match self.frames.back() {
            Some(last) => last.timestamp,
            None => return,
        };

        while let Some(oldest) = self.frames.front() {
            if newest - oldest.timestamp <= self.capacity {
                break;
            }

            self.frames.pop_front();
            if let Some(playhead) = self.playhead.as_mut() {
                *playhead = playhead.saturating_sub(1);
            }
        }
    }

    /// Move the playhead to the sync frame at or before `timestamp`
    ///
    /// Starts from the first frame at or after `timestamp` (or the last
    /// frame if there is none) and walks back to the nearest sync frame.
    /// Falls back to the oldest frame when no sync frame precedes it.
    pub fn reset(&mut self, timestamp: f64) {
        if self.frames.is_empty() {
            self.playhead = None;
            return;
        }

        let last = self.frames.len() - 1;
        let start = self
            .frames
            .partition_point(|f| f.timestamp < timestamp)
            .min(last);

        let index = (0..=start)
            .rev()
            .find(|&i| self.frames[i].is_sync())
            .unwrap_or(0);

        self.playhead = Some(index);
    }

    /// Take the frame at the playhead and advance it
    ///
    /// Returns `None` when playback has not started or the buffer has run
    /// dry.
    pub fn next(&mut self) -> Option<Frame> {
        let playhead = self.playhead?;
        let frame = self.frames.get(playhead)?.clone();
        self.playhead = Some(playhead + 1);
        Some(frame)
    }

    /// Oldest and newest timestamps, inclusive
    pub fn span(&self) -> Option<(f64, f64)> {
        let first = self.frames.front()?.timestamp;
        let last = self.frames.back()?.timestamp;
        Some((first, last))
    }

    /// Seconds of media between the playhead and the newest frame
    pub fn buffered(&self) -> Option<f64> {
        let playhead = self.playhead?;
        let current = self.frames.get(playhead)?.timestamp;
        let last = self.frames.back()?.timestamp;
        Some(last - current)
    }

    /// Current playhead index
    pub fn playhead(&self) -> Option<usize> {
        self.playhead
    }

    /// Get the number of buffered frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterate over buffered frames in timestamp order
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}

impl Default for Component {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn video(timestamp: f64, keyframe: bool) -> Frame {
        Frame::video(1, timestamp, Bytes::from_static(&[0x00]), keyframe)
    }

    fn timestamps(component: &Component) -> Vec<f64> {
        component.frames().map(|f| f.timestamp).collect()
    }

    fn is_sorted(component: &Component) -> bool {
        let ts = timestamps(component);
        ts.windows(2).all(|w| w[0] <= w[1])
    }

    #[test]
    fn test_in_order_push() {
        let mut component = Component::new();

        assert!(component.span().is_none());
        for ts in [0.0, 1.0, 2.0] {
            assert!(component.push(video(ts, ts == 0.0)));
        }

        assert_eq!(component.len(), 3);
        assert_eq!(component.span(), Some((0.0, 2.0)));
    }

    #[test]
    fn test_out_of_order_push_sorts() {
        let mut component = Component::new();

        for ts in [3.0, 1.0, 4.0, 0.0, 2.0, 2.5] {
            component.push(video(ts, false));
        }

        assert_eq!(timestamps(&component), vec![0.0, 1.0, 2.0, 2.5, 3.0, 4.0]);
    }

    #[test]
    fn test_equal_timestamps_insert_before() {
        let mut component = Component::new();

        component.push(Frame::video(1, 1.0, Bytes::from_static(b"a"), true));
        component.push(Frame::video(1, 2.0, Bytes::from_static(b"c"), false));
        component.push(Frame::video(1, 1.0, Bytes::from_static(b"b"), false));

        let data: Vec<_> = component.frames().map(|f| f.sample.data.clone()).collect();
        assert_eq!(data, vec![&b"b"[..], &b"a"[..], &b"c"[..]]);
    }

    #[test]
    fn test_insert_ahead_of_playhead_does_not_replay() {
        let mut component = Component::new();

        for ts in [0.0, 1.0, 3.0, 4.0] {
            component.push(video(ts, ts == 0.0));
        }
        component.reset(0.0);
        assert_eq!(component.next().unwrap().timestamp, 0.0);
        assert_eq!(component.next().unwrap().timestamp, 1.0);

        // Late frame lands before the playhead frame (3.0)
        component.push(video(2.0, false));
        assert_eq!(component.next().unwrap().timestamp, 3.0);
        assert_eq!(component.next().unwrap().timestamp, 4.0);
        assert!(component.next().is_none());
    }

    #[test]
    fn test_insert_after_playhead_is_played() {
        let mut component = Component::new();

        for ts in [0.0, 1.0, 3.0] {
            component.push(video(ts, ts == 0.0));
        }
        component.reset(0.0);
        component.next();

        component.push(video(2.0, false));
        let played: Vec<f64> = std::iter::from_fn(|| component.next())
            .map(|f| f.timestamp)
            .collect();
        assert_eq!(played, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_eviction_keeps_span_within_capacity() {
        let config = TimelineConfig::default().capacity(2.0);
        let mut component = Component::with_config(&config);

        for ts in [0.0, 1.0, 2.0, 3.0, 4.5] {
            component.push(video(ts, true));
        }

        let (start, end) = component.span().unwrap();
        assert!(end - start <= 2.0);
        assert_eq!(timestamps(&component), vec![3.0, 4.5]);
    }

    #[test]
    fn test_eviction_adjusts_playhead() {
        let config = TimelineConfig::default().capacity(2.0);
        let mut component = Component::with_config(&config);

        for ts in [0.0, 1.0, 2.0] {
            component.push(video(ts, true));
        }
        component.reset(1.0);
        assert_eq!(component.playhead(), Some(1));

        // Evicts 0.0; playhead must still point at 1.0
        component.push(video(2.5, true));
        assert_eq!(component.playhead(), Some(0));
        assert_eq!(component.next().unwrap().timestamp, 1.0);
    }

    #[test]
    fn test_stale_frame_discarded() {
        let config = TimelineConfig::default().capacity(2.0);
        let mut component = Component::with_config(&config);

        component.push(video(5.0, true));
        assert!(!component.push(video(2.0, true)));
        assert!(component.push(video(3.5, true)));
        assert_eq!(timestamps(&component), vec![3.5, 5.0]);
    }

    #[test]
    fn test_invalid_timestamp_discarded() {
        let mut component = Component::new();
        assert!(!component.push(video(f64::NAN, true)));
        assert!(component.is_empty());
    }

    #[test]
    fn test_arbitrary_pushes_stay_sorted_and_bounded() {
        let config = TimelineConfig::default().capacity(3.0);
        let mut component = Component::with_config(&config);

        // Deterministic scramble of 0.0..20.0 in 0.5 steps
        let mut seed: u64 = 0x2545_f491;
        for _ in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let ts = ((seed >> 33) % 40) as f64 * 0.5;
            component.push(video(ts, seed & 1 == 0));

            assert!(is_sorted(&component));
            let (start, end) = component.span().unwrap();
            assert!(end - start <= 3.0);
        }
    }

    #[test]
    fn test_reset_seeks_to_keyframe() {
        let mut component = Component::new();

        for ts in [0.0, 1.0, 2.0, 3.0, 4.0] {
            component.push(video(ts, ts == 0.0 || ts == 3.0));
        }

        component.reset(3.5);
        assert_eq!(component.next().unwrap().timestamp, 3.0);

        component.reset(1.5);
        assert_eq!(component.next().unwrap().timestamp, 0.0);
    }

    #[test]
    fn test_reset_past_end_clamps() {
        let mut component = Component::new();

        for ts in [0.0, 1.0, 2.0] {
            component.push(video(ts, ts == 1.0));
        }

        component.reset(100.0);
        assert_eq!(component.next().unwrap().timestamp, 1.0);
    }

    #[test]
    fn test_reset_without_keyframe_falls_back_to_oldest() {
        let mut component = Component::new();

        for ts in [0.0, 1.0, 2.0] {
            component.push(video(ts, false));
        }

        component.reset(1.5);
        assert_eq!(component.playhead(), Some(0));
    }

    #[test]
    fn test_next_before_start_and_on_underrun() {
        let mut component = Component::new();
        assert!(component.next().is_none());

        component.push(video(0.0, true));
        assert!(component.next().is_none()); // no playhead yet

        component.reset(0.0);
        assert!(component.next().is_some());
        assert!(component.next().is_none()); // underrun

        component.push(video(1.0, false));
        assert_eq!(component.next().unwrap().timestamp, 1.0);
    }

    #[test]
    fn test_buffered() {
        let mut component = Component::new();

        for ts in [0.0, 1.0, 2.0, 3.0] {
            component.push(video(ts, true));
        }
        assert!(component.buffered().is_none());

        component.reset(1.0);
        assert_eq!(component.buffered(), Some(2.0));
    }
}
