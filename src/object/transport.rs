//! One object per unidirectional stream
//!
//! The payload has no length field: the object ends when the sender
//! finishes the stream. A stream that is reset or dropped instead is an
//! error for that object only.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::transport::{SendStream, Session};

use super::header::ObjectHeader;

/// Error code used when a writer abandons an object
pub const ABORT_CODE: u32 = 0x1;

/// Opens object streams on a session
#[derive(Debug, Clone)]
pub struct ObjectSender<S: Session> {
    session: S,
}

impl<S: Session> ObjectSender<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    /// Open a stream, write the header and return the payload writer
    pub async fn send(&self, header: ObjectHeader) -> Result<ObjectWriter<S::SendStream>> {
        let mut buf = BytesMut::new();
        header.encode(&mut buf)?;

        let mut stream = self.session.open_uni().await?;
        stream
            .write_all(&buf)
            .await
            .map_err(Error::ObjectAborted)?;

        tracing::trace!(
            track = header.track,
            group = header.group,
            sequence = header.sequence,
            priority = header.priority,
            "Object opened"
        );

        Ok(ObjectWriter { header, stream })
    }
}

/// Payload sink for one outgoing object
#[derive(Debug)]
pub struct ObjectWriter<W: SendStream> {
    header: ObjectHeader,
    stream: W,
}

impl<W: SendStream> ObjectWriter<W> {
    /// Header this object was opened with
    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// Append payload bytes
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(Error::ObjectAborted)
    }

    /// Finish the object; the receiver sees end-of-payload
    pub async fn finish(mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(Error::ObjectAborted)
    }

    /// Abandon the object; the receiver sees an error
    pub fn abort(mut self, code: u32) {
        self.stream.reset(code);
    }
}

/// Accepts object streams on a session
#[derive(Debug, Clone)]
pub struct ObjectReceiver<S: Session> {
    session: S,
}

impl<S: Session> ObjectReceiver<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    /// Accept the next stream without reading its header
    ///
    /// Returns `None` when no more streams will arrive. Decoding is left to
    /// [`IncomingObject::header`] so a slow header does not hold up the
    /// accept loop.
    pub async fn accept(&self) -> Result<Option<IncomingObject<S::RecvStream>>> {
        let stream = self.session.accept_uni().await?;
        Ok(stream.map(|stream| IncomingObject { stream }))
    }

    /// Accept the next stream and decode its header
    pub async fn recv(&self) -> Result<Option<Object<S::RecvStream>>> {
        match self.accept().await? {
            Some(incoming) => Ok(Some(incoming.header().await?)),
            None => Ok(None),
        }
    }
}

/// An accepted stream whose header has not been read yet
#[derive(Debug)]
pub struct IncomingObject<R> {
    stream: R,
}

impl<R: tokio::io::AsyncRead + Unpin> IncomingObject<R> {
    /// Read the header, leaving the payload on the stream
    pub async fn header(mut self) -> Result<Object<R>> {
        let header = ObjectHeader::decode(&mut self.stream)
            .await
            .map_err(Error::MalformedObject)?;

        Ok(Object {
            header,
            payload: self.stream,
        })
    }
}

/// A received object: header plus the unread payload stream
#[derive(Debug)]
pub struct Object<R> {
    pub header: ObjectHeader,
    pub payload: R,
}

impl<R: tokio::io::AsyncRead + Unpin> Object<R> {
    /// Read the payload until the sender finishes the stream
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let mut buf = Vec::new();
        self.payload
            .read_to_end(&mut buf)
            .await
            .map_err(Error::ObjectAborted)?;
        Ok(Bytes::from(buf))
    }
}
