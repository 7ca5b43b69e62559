//! Live media publish/subscribe over a multiplexed transport
//!
//! A publisher announces a namespace on a control stream, the subscriber
//! subscribes to tracks in it, and media flows back as objects, one per
//! unidirectional stream. On the subscriber side a jitter-buffered
//! timeline reorders the frames and maps them to wall-clock time.
//!
//! # Layers
//!
//! - [`coding`]: varints, fixed-width integers and strings
//! - [`control`]: control messages and the control stream
//! - [`registry`]: publisher-side subscription table
//! - [`object`]: object headers and object streams
//! - [`transport`]: the session abstraction and an in-memory session
//! - [`media`]: container boundary (`Muxer`/`Demuxer`)
//! - [`timeline`]: reordering buffers and A/V sync
//! - [`session`]: publisher, subscriber and player drivers
//!
//! # Example
//!
//! ```no_run
//! use moq_live::session::{Publisher, SessionConfig, Subscriber};
//! use moq_live::transport::MemorySession;
//!
//! # async fn example() -> moq_live::error::Result<()> {
//! let (a, b) = MemorySession::pair();
//!
//! let (publisher, _events) = Publisher::connect(a, SessionConfig::with_namespace("live")).await?;
//! let subscriber = Subscriber::connect(b, SessionConfig::default()).await?;
//!
//! let mut catalog = subscriber.subscribe("catalog").await?;
//! if let Some(track) = publisher.track("catalog").await {
//!     let mut object = track.object(0, 0, 0).await?;
//!     object.write(b"CATALOG-BYTES").await?;
//!     object.finish().await?;
//! }
//!
//! if let Some(mut object) = catalog.next_object().await {
//!     let payload = object.read_to_end().await?;
//!     assert_eq!(&payload[..], b"CATALOG-BYTES");
//! }
//! # Ok(())
//! # }
//! ```

pub mod coding;
pub mod control;
pub mod error;
pub mod media;
pub mod object;
pub mod registry;
pub mod session;
pub mod timeline;
pub mod transport;

pub use error::{Error, Result};
pub use object::ObjectHeader;
pub use session::{Player, Publisher, PublisherEvent, SessionConfig, Subscriber};
pub use timeline::{Frame, MediaKind, TimelineConfig, TimelineSync};
pub use transport::{MemorySession, Session};
