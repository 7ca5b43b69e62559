//! Transport session abstraction
//!
//! The protocol runs over a session that can carry one long-lived
//! bidirectional stream (control) and any number of unidirectional streams
//! (objects). Each stream delivers its bytes reliably and in order; nothing
//! is guaranteed across streams.
//!
//! Establishing the session (handshake, certificate checks) happens outside
//! this crate. Anything implementing [`Session`] can be plugged in; the
//! [`memory`] module provides an in-process pair for tests and demos.

pub mod memory;

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

pub use memory::{MemoryRecvStream, MemorySendStream, MemorySession};

/// Error type for transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The session is closed; no more streams can be opened or accepted
    #[error("session closed")]
    Closed,

    /// The peer aborted the stream before finishing it
    #[error("stream reset with code {0}")]
    Reset(u32),

    /// Underlying I/O failure
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Writable half of a stream
///
/// Finishing is done with `AsyncWriteExt::shutdown`, which tells the peer
/// that the stream ended cleanly. `reset` aborts it instead.
pub trait SendStream: AsyncWrite + Unpin + Send + 'static {
    /// Abort the stream; the peer sees an error rather than end-of-stream
    fn reset(&mut self, code: u32);
}

/// Readable half of a stream
///
/// End-of-stream is a zero-length read. A reset surfaces as an I/O error.
pub trait RecvStream: AsyncRead + Unpin + Send + 'static {}

impl<T: AsyncRead + Unpin + Send + 'static> RecvStream for T {}

/// A multiplexed transport session
pub trait Session: Clone + Send + Sync + 'static {
    type SendStream: SendStream;
    type RecvStream: RecvStream;

    /// Open a bidirectional stream
    fn open_bi(
        &self,
    ) -> impl Future<Output = Result<(Self::SendStream, Self::RecvStream), TransportError>> + Send;

    /// Accept the next bidirectional stream, or `None` once the session ends
    fn accept_bi(
        &self,
    ) -> impl Future<Output = Result<Option<(Self::SendStream, Self::RecvStream)>, TransportError>>
           + Send;

    /// Open a unidirectional stream
    fn open_uni(&self) -> impl Future<Output = Result<Self::SendStream, TransportError>> + Send;

    /// Accept the next unidirectional stream, or `None` once the session ends
    fn accept_uni(
        &self,
    ) -> impl Future<Output = Result<Option<Self::RecvStream>, TransportError>> + Send;

    /// Close the session with an application code and reason
    fn close(&self, code: u32, reason: &str) -> impl Future<Output = ()> + Send;
}
