//! Control message definitions
//!
//! Each message is a varint type tag followed by its fields in order. There
//! is no outer length, so the decoder must know the shape of every tag.
//!
//! ```text
//! 0x3  SUBSCRIBE       id(i) namespace(s) name(s)
//! 0x4  SUBSCRIBE_OK    id(i)
//! 0x5  SUBSCRIBE_ERROR id(i) code(i) reason(s)
//! 0x6  ANNOUNCE        namespace(s)
//! 0x7  ANNOUNCE_OK     namespace(s)
//! 0x8  ANNOUNCE_ERROR  namespace(s) code(i) reason(s)
//! ```

use bytes::BufMut;
use tokio::io::AsyncRead;

use crate::coding::{decode_string, encode_string, DecodeError, EncodeError, VarInt};

const TYPE_SUBSCRIBE: u64 = 0x3;
const TYPE_SUBSCRIBE_OK: u64 = 0x4;
const TYPE_SUBSCRIBE_ERROR: u64 = 0x5;
const TYPE_ANNOUNCE: u64 = 0x6;
const TYPE_ANNOUNCE_OK: u64 = 0x7;
const TYPE_ANNOUNCE_ERROR: u64 = 0x8;

/// A message on the control stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Publisher offers a namespace
    Announce(Announce),
    /// Subscriber accepts the namespace
    AnnounceOk(AnnounceOk),
    /// Subscriber rejects the namespace
    AnnounceError(AnnounceError),
    /// Subscriber requests a track
    Subscribe(Subscribe),
    /// Publisher accepts the subscription
    SubscribeOk(SubscribeOk),
    /// Publisher rejects the subscription
    SubscribeError(SubscribeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announce {
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceOk {
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceError {
    pub namespace: String,
    pub code: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    /// Chosen by the subscriber, unique within the session
    pub id: u64,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOk {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeError {
    pub id: u64,
    pub code: u64,
    pub reason: String,
}

impl Message {
    /// Short name used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Announce(_) => "ANNOUNCE",
            Message::AnnounceOk(_) => "ANNOUNCE_OK",
            Message::AnnounceError(_) => "ANNOUNCE_ERROR",
            Message::Subscribe(_) => "SUBSCRIBE",
            Message::SubscribeOk(_) => "SUBSCRIBE_OK",
            Message::SubscribeError(_) => "SUBSCRIBE_ERROR",
        }
    }

    fn type_id(&self) -> u64 {
        match self {
            Message::Announce(_) => TYPE_ANNOUNCE,
            Message::AnnounceOk(_) => TYPE_ANNOUNCE_OK,
            Message::AnnounceError(_) => TYPE_ANNOUNCE_ERROR,
            Message::Subscribe(_) => TYPE_SUBSCRIBE,
            Message::SubscribeOk(_) => TYPE_SUBSCRIBE_OK,
            Message::SubscribeError(_) => TYPE_SUBSCRIBE_ERROR,
        }
    }

    /// Encode the tag and fields
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<(), EncodeError> {
        VarInt::try_from(self.type_id())?.encode(buf);

        match self {
            Message::Announce(m) => encode_string(buf, &m.namespace)?,
            Message::AnnounceOk(m) => encode_string(buf, &m.namespace)?,
            Message::AnnounceError(m) => {
                encode_string(buf, &m.namespace)?;
                VarInt::try_from(m.code)?.encode(buf);
                encode_string(buf, &m.reason)?;
            }
            Message::Subscribe(m) => {
                VarInt::try_from(m.id)?.encode(buf);
                encode_string(buf, &m.namespace)?;
                encode_string(buf, &m.name)?;
            }
            Message::SubscribeOk(m) => VarInt::try_from(m.id)?.encode(buf),
            Message::SubscribeError(m) => {
                VarInt::try_from(m.id)?.encode(buf);
                VarInt::try_from(m.code)?.encode(buf);
                encode_string(buf, &m.reason)?;
            }
        }

        Ok(())
    }

    /// Decode one message, reading exactly the bytes its tag implies
    ///
    /// `max_string` bounds every string field.
    pub async fn decode<R: AsyncRead + Unpin>(
        r: &mut R,
        max_string: usize,
    ) -> Result<Self, DecodeError> {
        let tag = VarInt::decode(r).await?.into_inner();

        let msg = match tag {
            TYPE_ANNOUNCE => Message::Announce(Announce {
                namespace: decode_string(r, max_string).await?,
            }),
            TYPE_ANNOUNCE_OK => Message::AnnounceOk(AnnounceOk {
                namespace: decode_string(r, max_string).await?,
            }),
            TYPE_ANNOUNCE_ERROR => Message::AnnounceError(AnnounceError {
                namespace: decode_string(r, max_string).await?,
                code: VarInt::decode(r).await?.into_inner(),
                reason: decode_string(r, max_string).await?,
            }),
            TYPE_SUBSCRIBE => Message::Subscribe(Subscribe {
                id: VarInt::decode(r).await?.into_inner(),
                namespace: decode_string(r, max_string).await?,
                name: decode_string(r, max_string).await?,
            }),
            TYPE_SUBSCRIBE_OK => Message::SubscribeOk(SubscribeOk {
                id: VarInt::decode(r).await?.into_inner(),
            }),
            TYPE_SUBSCRIBE_ERROR => Message::SubscribeError(SubscribeError {
                id: VarInt::decode(r).await?.into_inner(),
                code: VarInt::decode(r).await?.into_inner(),
                reason: decode_string(r, max_string).await?,
            }),
            other => return Err(DecodeError::UnknownMessage(other)),
        };

        Ok(msg)
    }
}

impl From<Announce> for Message {
    fn from(m: Announce) -> Self {
        Message::Announce(m)
    }
}

impl From<AnnounceOk> for Message {
    fn from(m: AnnounceOk) -> Self {
        Message::AnnounceOk(m)
    }
}

impl From<AnnounceError> for Message {
    fn from(m: AnnounceError) -> Self {
        Message::AnnounceError(m)
    }
}

impl From<Subscribe> for Message {
    fn from(m: Subscribe) -> Self {
        Message::Subscribe(m)
    }
}

impl From<SubscribeOk> for Message {
    fn from(m: SubscribeOk) -> Self {
        Message::SubscribeOk(m)
    }
}

impl From<SubscribeError> for Message {
    fn from(m: SubscribeError) -> Self {
        Message::SubscribeError(m)
    }
}
