//! Session control channel
//!
//! One bidirectional stream per session carries every control message, in
//! order, in both directions. The publisher opens it and the subscriber
//! accepts it. Losing this stream ends the session.
//!
//! The channel is split in two halves: [`ControlSender`] is cheap to clone
//! so replies can be sent from any task, while [`ControlReceiver`] is owned
//! by the single task that runs the control loop.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::coding::MAX_STRING_LENGTH;
use crate::error::{Error, Result};
use crate::transport::{SendStream, Session, TransportError};

use super::message::{
    Announce, AnnounceError, AnnounceOk, Message, Subscribe, SubscribeError, SubscribeOk,
};

/// Open the control stream (publisher side)
pub async fn open<S: Session>(
    session: &S,
) -> Result<(ControlSender<S::SendStream>, ControlReceiver<S::RecvStream>)> {
    let (send, recv) = session.open_bi().await?;
    Ok((ControlSender::new(send), ControlReceiver::new(recv)))
}

/// Accept the control stream (subscriber side)
pub async fn accept<S: Session>(
    session: &S,
) -> Result<(ControlSender<S::SendStream>, ControlReceiver<S::RecvStream>)> {
    let (send, recv) = session.accept_bi().await?.ok_or(Error::SessionClosed)?;
    Ok((ControlSender::new(send), ControlReceiver::new(recv)))
}

/// Writing half of the control channel
#[derive(Debug)]
pub struct ControlSender<W: SendStream> {
    stream: Arc<Mutex<W>>,
}

impl<W: SendStream> Clone for ControlSender<W> {
    fn clone(&self) -> Self {
        Self {
            stream: Arc::clone(&self.stream),
        }
    }
}

impl<W: SendStream> ControlSender<W> {
    pub fn new(stream: W) -> Self {
        Self {
            stream: Arc::new(Mutex::new(stream)),
        }
    }

    /// Send one message
    ///
    /// The message is encoded up front so a failed encode never leaves a
    /// partial message on the stream.
    pub async fn send(&self, msg: impl Into<Message>) -> Result<()> {
        let msg = msg.into();

        let mut buf = BytesMut::new();
        msg.encode(&mut buf)?;

        let mut stream = self.stream.lock().await;
        stream
            .write_all(&buf)
            .await
            .map_err(TransportError::from)?;
        stream.flush().await.map_err(TransportError::from)?;

        tracing::debug!(message = msg.kind(), "Control message sent");
        Ok(())
    }

    pub async fn announce(&self, namespace: &str) -> Result<()> {
        self.send(Announce {
            namespace: namespace.to_string(),
        })
        .await
    }

    pub async fn announce_ok(&self, namespace: &str) -> Result<()> {
        self.send(AnnounceOk {
            namespace: namespace.to_string(),
        })
        .await
    }

    pub async fn announce_error(&self, namespace: &str, code: u64, reason: &str) -> Result<()> {
        self.send(AnnounceError {
            namespace: namespace.to_string(),
            code,
            reason: reason.to_string(),
        })
        .await
    }

    pub async fn subscribe(&self, id: u64, namespace: &str, name: &str) -> Result<()> {
        self.send(Subscribe {
            id,
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
        .await
    }

    pub async fn subscribe_ok(&self, id: u64) -> Result<()> {
        self.send(SubscribeOk { id }).await
    }

    pub async fn subscribe_error(&self, id: u64, code: u64, reason: &str) -> Result<()> {
        self.send(SubscribeError {
            id,
            code,
            reason: reason.to_string(),
        })
        .await
    }

    /// Finish the control stream, ending the session for the peer
    pub async fn close(&self) -> Result<()> {
        let mut stream = self.stream.lock().await;
        stream.shutdown().await.map_err(TransportError::from)?;
        Ok(())
    }
}

/// Reading half of the control channel
#[derive(Debug)]
pub struct ControlReceiver<R> {
    stream: R,
    max_string: usize,
}

impl<R: AsyncRead + Unpin> ControlReceiver<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            max_string: MAX_STRING_LENGTH,
        }
    }

    /// Limit the length of string fields accepted from the peer
    pub fn with_max_string(mut self, max_string: usize) -> Self {
        self.max_string = max_string;
        self
    }

    /// Receive the next message
    ///
    /// Returns `None` when the peer finished the stream cleanly between
    /// messages. A stream that ends mid-message is a decode error.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        let mut first = [0u8; 1];
        let n = self
            .stream
            .read(&mut first)
            .await
            .map_err(TransportError::from)?;
        if n == 0 {
            return Ok(None);
        }

        let mut r = (&first[..]).chain(&mut self.stream);
        let msg = Message::decode(&mut r, self.max_string).await?;

        tracing::debug!(message = msg.kind(), "Control message received");
        Ok(Some(msg))
    }
}
