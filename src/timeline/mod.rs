//! Playback timeline
//!
//! - [`Component`]: one media type's jitter buffer with a playhead
//! - [`TimelineSync`]: audio + video components with a shared wall clock
//!
//! Frames may be pushed in any order. The renderer pulls frames with
//! `next`, maps their timestamps to wall-clock time with `sync`, and
//! resets itself whenever `continuity` changes.

pub mod component;
pub mod config;
pub mod frame;
pub mod sync;

pub use component::Component;
pub use config::TimelineConfig;
pub use frame::{Frame, MediaKind, Sample, TrackRef};
pub use sync::{Clock, ManualClock, SystemClock, TimelineSync};
