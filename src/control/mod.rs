//! Control plane
//!
//! - [`message`]: the six control messages and their wire encoding
//! - [`channel`]: the ordered control stream that carries them

pub mod channel;
pub mod message;

pub use channel::{ControlReceiver, ControlSender};
pub use message::{
    Announce, AnnounceError, AnnounceOk, Message, Subscribe, SubscribeError, SubscribeOk,
};
