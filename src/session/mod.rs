//! Session drivers
//!
//! A session is one transport connection between a publisher and a
//! subscriber. Each side runs its control loop as its own task; objects
//! are handled by further tasks, one per stream.
//!
//! # Architecture
//!
//! ```text
//!        Publisher                                   Subscriber
//!   ┌──────────────────┐     control (bi)       ┌──────────────────┐
//!   │ ControlLoop      │◀──────────────────────▶│ ControlLoop      │
//!   │   registry       │  ANNOUNCE / SUBSCRIBE  │   pending ids    │
//!   └──────────────────┘                        └──────────────────┘
//!   ┌──────────────────┐     objects (uni)      ┌──────────────────┐
//!   │ TrackWriter      │───────────────────────▶│ object router    │
//!   └──────────────────┘                        └────────┬─────────┘
//!                                                        ▼
//!                                               TrackReader ──▶ Player
//! ```
//!
//! Losing the control stream closes the session on both sides; a failed
//! object only loses that object.

pub mod config;
pub mod player;
pub mod publisher;
pub mod state;
pub mod subscriber;
pub mod track;

pub use config::SessionConfig;
pub use player::{Player, Presentation};
pub use publisher::{Publisher, PublisherEvent};
pub use state::{SessionPhase, SessionState};
pub use subscriber::Subscriber;
pub use track::{TrackReader, TrackWriter};
