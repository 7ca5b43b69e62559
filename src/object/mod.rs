//! Object transport
//!
//! Media travels as objects. Each object gets its own unidirectional stream
//! carrying an [`ObjectHeader`] followed by the payload, so objects of the
//! same track can be in flight at once and arrive in any order.

pub mod header;
pub mod transport;

pub use header::ObjectHeader;
pub use transport::{IncomingObject, Object, ObjectReceiver, ObjectSender, ObjectWriter, ABORT_CODE};
