//! Subscription registry for publisher-side routing
//!
//! The control loop registers each accepted `SUBSCRIBE`; track writers look
//! up the subscription id for their track name before opening objects.
//!
//! ```text
//!   [control loop]                       [track writer]
//!   SUBSCRIBE{id, ns, name}              lookup(name)
//!         │                                   │
//!         ▼                                   ▼
//!   ┌──────────────────────────────────────────────┐
//!   │ SubscriptionRegistry                          │
//!   │   by_name: name -> id                         │
//!   │   by_id:   id -> name                         │
//!   └──────────────────────────────────────────────┘
//!         │                                   │
//!         ▼                                   ▼
//!   SUBSCRIBE_OK / SUBSCRIBE_ERROR       ObjectHeader{track: id, ..}
//! ```

pub mod error;
pub mod store;

pub use error::RegistryError;
pub use store::SubscriptionRegistry;
