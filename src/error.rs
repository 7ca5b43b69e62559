//! Error types
//!
//! Each layer has its own error enum ([`EncodeError`], [`DecodeError`],
//! [`RegistryError`], [`TransportError`]); [`Error`] wraps them together with
//! the session-level failures.
//!
//! Errors are either scoped to one request or object, or fatal to the whole
//! session. See [`Error::is_fatal`].

use crate::coding::{DecodeError, EncodeError};
use crate::registry::RegistryError;
use crate::transport::TransportError;

/// Result type alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Code sent in `SUBSCRIBE_ERROR` for failures without a specific code
pub const CODE_INTERNAL: u64 = 0x0;
/// Code sent when the requested namespace is not served
pub const CODE_UNKNOWN_NAMESPACE: u64 = 0x1;
/// Code sent when the subscription id is already taken
pub const CODE_DUPLICATE_ID: u64 = 0x2;
/// Code sent when the track is already subscribed
pub const CODE_DUPLICATE_NAME: u64 = 0x3;
/// Code sent in `ANNOUNCE_ERROR` when the session already carries a namespace
pub const CODE_ALREADY_ANNOUNCED: u64 = 0x4;

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Subscribe against a namespace this session does not serve
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    /// A control message that is not valid for this role or state
    #[error("unhandled message: {0}")]
    UnhandledMessage(&'static str),

    /// The peer rejected a subscription
    #[error("subscribe {id} rejected ({code}): {reason}")]
    SubscribeRejected { id: u64, code: u64, reason: String },

    /// The peer rejected the announced namespace
    #[error("announce {namespace} rejected ({code}): {reason}")]
    AnnounceRejected {
        namespace: String,
        code: u64,
        reason: String,
    },

    /// An object stream started with an invalid header
    #[error("malformed object: {0}")]
    MalformedObject(#[source] DecodeError),

    /// An object stream was aborted before it finished
    #[error("object aborted: {0}")]
    ObjectAborted(#[source] std::io::Error),

    /// The control stream ended; the session is over
    #[error("session closed")]
    SessionClosed,
}

impl Error {
    /// Code to carry in an `*_ERROR` reply for this failure
    pub fn code(&self) -> u64 {
        match self {
            Error::UnknownNamespace(_) => CODE_UNKNOWN_NAMESPACE,
            Error::Registry(RegistryError::DuplicateId(_)) => CODE_DUPLICATE_ID,
            Error::Registry(RegistryError::DuplicateName(_)) => CODE_DUPLICATE_NAME,
            Error::SubscribeRejected { code, .. } | Error::AnnounceRejected { code, .. } => *code,
            _ => CODE_INTERNAL,
        }
    }

    /// Whether this error ends the session
    ///
    /// Registry and namespace failures only reject one request. Everything
    /// that breaks the control stream is fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Registry(_)
            | Error::UnknownNamespace(_)
            | Error::SubscribeRejected { .. }
            | Error::MalformedObject(_)
            | Error::ObjectAborted(_)
            | Error::Encode(_) => false,
            Error::Decode(_)
            | Error::Transport(_)
            | Error::UnhandledMessage(_)
            | Error::AnnounceRejected { .. }
            | Error::SessionClosed => true,
        }
    }
}
