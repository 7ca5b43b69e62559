//! Per-track writers and readers
//!
//! A [`TrackWriter`] turns a stream of muxed segments into objects: each
//! segment that starts a group closes the open object and opens the next
//! one. A [`TrackReader`] hands out the objects the subscriber routed to
//! one subscription.

use tokio::sync::{mpsc, watch};

use crate::error::Result;
use crate::media::Segment;
use crate::object::{Object, ObjectHeader, ObjectSender, ObjectWriter};
use crate::transport::Session;

use super::state::SessionState;

/// Publisher side of one subscribed track
pub struct TrackWriter<S: Session> {
    id: u64,
    name: String,
    objects: ObjectSender<S>,
    priority: u32,
    next_group: u64,
    current: Option<ObjectWriter<S::SendStream>>,
}

impl<S: Session> TrackWriter<S> {
    pub(crate) fn new(id: u64, name: String, objects: ObjectSender<S>, priority: u32) -> Self {
        Self {
            id,
            name,
            objects,
            priority,
            next_group: 0,
            current: None,
        }
    }

    /// Subscription id objects are tagged with
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Track name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group the next boundary will open
    pub fn next_group(&self) -> u64 {
        self.next_group
    }

    /// Change the priority of objects opened from now on
    pub fn set_priority(&mut self, priority: u32) {
        self.priority = priority;
    }

    /// Append a segment, opening a new object at group boundaries
    ///
    /// The first segment always opens an object, even if it does not
    /// claim to start a group.
    pub async fn write(&mut self, segment: Segment) -> Result<()> {
        if segment.new_group || self.current.is_none() {
            self.finish_group().await?;

            let header = ObjectHeader::new(self.id, self.next_group, 0, self.priority);
            self.current = Some(self.objects.send(header).await?);
            self.next_group += 1;

            tracing::debug!(
                track = %self.name,
                id = self.id,
                group = header.group,
                "Group started"
            );
        }

        match self.current.as_mut() {
            Some(object) => object.write(&segment.data).await,
            None => Ok(()),
        }
    }

    /// Open an object with explicit placement, bypassing group tracking
    pub async fn object(
        &self,
        group: u64,
        sequence: u64,
        priority: u32,
    ) -> Result<ObjectWriter<S::SendStream>> {
        let header = ObjectHeader::new(self.id, group, sequence, priority);
        self.objects.send(header).await
    }

    /// Finish the open object, if any
    pub async fn finish_group(&mut self) -> Result<()> {
        match self.current.take() {
            Some(object) => object.finish().await,
            None => Ok(()),
        }
    }

    /// Finish the open object and drop the writer
    pub async fn finish(mut self) -> Result<()> {
        self.finish_group().await
    }
}

/// Subscriber side of one subscribed track
#[derive(Debug)]
pub struct TrackReader<R> {
    id: u64,
    name: String,
    objects: mpsc::Receiver<Object<R>>,
    state: watch::Receiver<SessionState>,
}

impl<R> TrackReader<R> {
    pub(crate) fn new(
        id: u64,
        name: String,
        objects: mpsc::Receiver<Object<R>>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            id,
            name,
            objects,
            state,
        }
    }

    /// Subscription id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Track name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next object for this track, in arrival order
    ///
    /// Returns `None` once the session is closed.
    pub async fn next_object(&mut self) -> Option<Object<R>> {
        self.objects.recv().await
    }

    /// Why the session closed, if it has
    pub fn close_reason(&self) -> Option<String> {
        self.state.borrow().close_reason.clone()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::object::ObjectReceiver;
    use crate::transport::MemorySession;

    fn segment(data: &'static [u8], new_group: bool) -> Segment {
        Segment {
            data: Bytes::from_static(data),
            new_group,
        }
    }

    #[tokio::test]
    async fn test_groups_follow_boundaries() {
        let (a, b) = MemorySession::pair();
        let mut writer = TrackWriter::new(7, "video".into(), ObjectSender::new(a), 2);
        let receiver = ObjectReceiver::new(b);

        writer.write(segment(b"K1", true)).await.unwrap();
        writer.write(segment(b"d1", false)).await.unwrap();
        writer.write(segment(b"K2", true)).await.unwrap();
        writer.write(segment(b"d2", false)).await.unwrap();
        writer.finish().await.unwrap();

        let mut first = receiver.recv().await.unwrap().unwrap();
        assert_eq!(first.header, ObjectHeader::new(7, 0, 0, 2));
        assert_eq!(&first.read_to_end().await.unwrap()[..], b"K1d1");

        let mut second = receiver.recv().await.unwrap().unwrap();
        assert_eq!(second.header, ObjectHeader::new(7, 1, 0, 2));
        assert_eq!(&second.read_to_end().await.unwrap()[..], b"K2d2");
    }

    #[tokio::test]
    async fn test_first_segment_opens_object() {
        let (a, b) = MemorySession::pair();
        let mut writer = TrackWriter::new(1, "audio".into(), ObjectSender::new(a), 0);
        let receiver = ObjectReceiver::new(b);

        writer.write(segment(b"x", false)).await.unwrap();
        assert_eq!(writer.next_group(), 1);
        writer.finish().await.unwrap();

        let mut object = receiver.recv().await.unwrap().unwrap();
        assert_eq!(object.header.group, 0);
        assert_eq!(&object.read_to_end().await.unwrap()[..], b"x");
    }

    #[tokio::test]
    async fn test_explicit_object() {
        let (a, b) = MemorySession::pair();
        let writer = TrackWriter::new(3, "catalog".into(), ObjectSender::new(a), 0);
        let receiver = ObjectReceiver::new(b);

        let mut object = writer.object(4, 2, 5).await.unwrap();
        object.write(b"data").await.unwrap();
        object.finish().await.unwrap();

        let received = receiver.recv().await.unwrap().unwrap();
        assert_eq!(received.header, ObjectHeader::new(3, 4, 2, 5));
    }
}
