//! In-process transport session
//!
//! Two connected [`MemorySession`]s exchange streams over tokio channels.
//! Each stream is a channel of chunks, so per-stream ordering holds while
//! separate streams are delivered independently.
//!
//! A send stream that is dropped without being shut down reads as a reset
//! on the other side, matching how QUIC treats an abandoned stream.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::{mpsc, watch, Mutex};

use super::{SendStream, Session, TransportError};

#[derive(Debug)]
enum Chunk {
    Data(Bytes),
    Fin,
    Reset(u32),
}

/// Writable half of an in-memory stream
#[derive(Debug)]
pub struct MemorySendStream {
    tx: Option<mpsc::UnboundedSender<Chunk>>,
}

/// Readable half of an in-memory stream
#[derive(Debug)]
pub struct MemoryRecvStream {
    rx: mpsc::UnboundedReceiver<Chunk>,
    pending: Bytes,
    finished: bool,
}

fn stream_pair() -> (MemorySendStream, MemoryRecvStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemorySendStream { tx: Some(tx) },
        MemoryRecvStream {
            rx,
            pending: Bytes::new(),
            finished: false,
        },
    )
}

impl AsyncWrite for MemorySendStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let tx = match self.tx.as_ref() {
            Some(tx) => tx,
            None => return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        };

        if tx.send(Chunk::Data(Bytes::copy_from_slice(buf))).is_err() {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }

        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if let Some(tx) = self.tx.take() {
            // The reader may already be gone; finishing is still a success.
            let _ = tx.send(Chunk::Fin);
        }
        Poll::Ready(Ok(()))
    }
}

impl SendStream for MemorySendStream {
    fn reset(&mut self, code: u32) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Chunk::Reset(code));
        }
    }
}

impl AsyncRead for MemoryRecvStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            if !this.pending.is_empty() {
                let n = this.pending.len().min(buf.remaining());
                buf.put_slice(&this.pending.split_to(n));
                return Poll::Ready(Ok(()));
            }

            if this.finished {
                return Poll::Ready(Ok(()));
            }

            match ready!(this.rx.poll_recv(cx)) {
                Some(Chunk::Data(data)) => this.pending = data,
                Some(Chunk::Fin) => this.finished = true,
                Some(Chunk::Reset(code)) => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        TransportError::Reset(code),
                    )));
                }
                None => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "stream dropped before finish",
                    )));
                }
            }
        }
    }
}

type BiStream = (MemorySendStream, MemoryRecvStream);

#[derive(Debug)]
struct Endpoint {
    uni_tx: Mutex<Option<mpsc::UnboundedSender<MemoryRecvStream>>>,
    uni_rx: Mutex<mpsc::UnboundedReceiver<MemoryRecvStream>>,
    bi_tx: Mutex<Option<mpsc::UnboundedSender<BiStream>>>,
    bi_rx: Mutex<mpsc::UnboundedReceiver<BiStream>>,
    closed: watch::Sender<bool>,
}

impl Endpoint {
    fn new(
        uni_tx: mpsc::UnboundedSender<MemoryRecvStream>,
        uni_rx: mpsc::UnboundedReceiver<MemoryRecvStream>,
        bi_tx: mpsc::UnboundedSender<BiStream>,
        bi_rx: mpsc::UnboundedReceiver<BiStream>,
    ) -> Self {
        Self {
            uni_tx: Mutex::new(Some(uni_tx)),
            uni_rx: Mutex::new(uni_rx),
            bi_tx: Mutex::new(Some(bi_tx)),
            bi_rx: Mutex::new(bi_rx),
            closed: watch::Sender::new(false),
        }
    }
}

/// One end of an in-process session
#[derive(Debug, Clone)]
pub struct MemorySession {
    inner: Arc<Endpoint>,
}

impl MemorySession {
    /// Create two connected ends
    pub fn pair() -> (Self, Self) {
        let (a_uni_tx, b_uni_rx) = mpsc::unbounded_channel();
        let (b_uni_tx, a_uni_rx) = mpsc::unbounded_channel();
        let (a_bi_tx, b_bi_rx) = mpsc::unbounded_channel();
        let (b_bi_tx, a_bi_rx) = mpsc::unbounded_channel();

        let a = Endpoint::new(a_uni_tx, a_uni_rx, a_bi_tx, a_bi_rx);
        let b = Endpoint::new(b_uni_tx, b_uni_rx, b_bi_tx, b_bi_rx);

        (
            Self { inner: Arc::new(a) },
            Self { inner: Arc::new(b) },
        )
    }
}

impl Session for MemorySession {
    type SendStream = MemorySendStream;
    type RecvStream = MemoryRecvStream;

    async fn open_bi(&self) -> Result<(Self::SendStream, Self::RecvStream), TransportError> {
        let (local_send, remote_recv) = stream_pair();
        let (remote_send, local_recv) = stream_pair();

        let tx = self.inner.bi_tx.lock().await;
        tx.as_ref()
            .ok_or(TransportError::Closed)?
            .send((remote_send, remote_recv))
            .map_err(|_| TransportError::Closed)?;

        Ok((local_send, local_recv))
    }

    async fn accept_bi(
        &self,
    ) -> Result<Option<(Self::SendStream, Self::RecvStream)>, TransportError> {
        let mut closed = self.inner.closed.subscribe();
        let mut rx = self.inner.bi_rx.lock().await;

        let is_closed = *closed.borrow_and_update();
        if is_closed {
            return Ok(None);
        }

        tokio::select! {
            stream = rx.recv() => Ok(stream),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn open_uni(&self) -> Result<Self::SendStream, TransportError> {
        let (send, recv) = stream_pair();

        let tx = self.inner.uni_tx.lock().await;
        tx.as_ref()
            .ok_or(TransportError::Closed)?
            .send(recv)
            .map_err(|_| TransportError::Closed)?;

        Ok(send)
    }

    async fn accept_uni(&self) -> Result<Option<Self::RecvStream>, TransportError> {
        let mut closed = self.inner.closed.subscribe();
        let mut rx = self.inner.uni_rx.lock().await;

        let is_closed = *closed.borrow_and_update();
        if is_closed {
            return Ok(None);
        }

        tokio::select! {
            stream = rx.recv() => Ok(stream),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn close(&self, code: u32, reason: &str) {
        self.inner.uni_tx.lock().await.take();
        self.inner.bi_tx.lock().await.take();

        // Wake pending accepts so they release the receivers
        self.inner.closed.send_replace(true);
        self.inner.uni_rx.lock().await.close();
        self.inner.bi_rx.lock().await.close();

        tracing::debug!(code = code, reason = reason, "Memory session closed");
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn test_uni_stream_delivers_bytes_then_eof() {
        let (a, b) = MemorySession::pair();

        let mut send = a.open_uni().await.unwrap();
        send.write_all(b"hello ").await.unwrap();
        send.write_all(b"world").await.unwrap();
        send.shutdown().await.unwrap();

        let mut recv = b.accept_uni().await.unwrap().unwrap();
        let mut out = Vec::new();
        recv.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn test_reset_is_an_error_not_eof() {
        let (a, b) = MemorySession::pair();

        let mut send = a.open_uni().await.unwrap();
        send.write_all(b"partial").await.unwrap();
        send.reset(7);

        let mut recv = b.accept_uni().await.unwrap().unwrap();
        let mut out = Vec::new();
        let err = recv.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_dropped_stream_is_aborted() {
        let (a, b) = MemorySession::pair();

        let send = a.open_uni().await.unwrap();
        drop(send);

        let mut recv = b.accept_uni().await.unwrap().unwrap();
        let mut out = Vec::new();
        assert!(recv.read_to_end(&mut out).await.is_err());
    }

    #[tokio::test]
    async fn test_bi_stream_both_directions() {
        let (a, b) = MemorySession::pair();

        let (mut a_send, mut a_recv) = a.open_bi().await.unwrap();
        let (mut b_send, mut b_recv) = b.accept_bi().await.unwrap().unwrap();

        a_send.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        b_recv.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        b_send.write_all(b"pong").await.unwrap();
        a_recv.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_close_ends_accept_on_both_sides() {
        let (a, b) = MemorySession::pair();

        a.close(0, "done").await;

        assert!(b.accept_uni().await.unwrap().is_none());
        assert!(a.accept_uni().await.unwrap().is_none());
        assert!(matches!(a.open_uni().await, Err(TransportError::Closed)));
        assert!(matches!(b.open_uni().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_close_wakes_pending_accept() {
        let (a, _b) = MemorySession::pair();

        let waiting = {
            let a = a.clone();
            tokio::spawn(async move { a.accept_uni().await })
        };
        tokio::task::yield_now().await;

        a.close(0, "done").await;
        assert!(waiting.await.unwrap().unwrap().is_none());
    }
}
