//! Subscriber session driver
//!
//! Accepts the publisher's announcement, sends subscriptions and routes the
//! incoming objects to the [`TrackReader`] that asked for them.
//!
//! ```text
//!            ┌────────────── control loop ──────────────┐
//! control ──▶│ ANNOUNCE        -> ANNOUNCE_OK            │
//!            │ SUBSCRIBE_OK    -> resolve pending[id]    │
//!            │ SUBSCRIBE_ERROR -> reject pending[id]     │
//!            └──────────────────────────────────────────┘
//!            ┌────────────── object loop ───────────────┐
//! uni    ──▶ │ header.track -> tracks[id] -> TrackReader │
//!            └──────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::control::{channel, ControlReceiver, ControlSender, Message};
use crate::error::{Error, Result, CODE_ALREADY_ANNOUNCED, CODE_UNKNOWN_NAMESPACE};
use crate::object::{Object, ObjectReceiver};
use crate::transport::{RecvStream, Session};

use super::config::SessionConfig;
use super::state::SessionState;
use super::track::TrackReader;

/// Routing state shared by the control loop, the object loop and callers
#[derive(Debug)]
struct Routes<R> {
    /// Subscriptions waiting for SUBSCRIBE_OK or SUBSCRIBE_ERROR
    pending: HashMap<u64, oneshot::Sender<Result<()>>>,
    /// Object queues by subscription id
    tracks: HashMap<u64, mpsc::Sender<Object<R>>>,
    closed: bool,
}

impl<R> Default for Routes<R> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            tracks: HashMap::new(),
            closed: false,
        }
    }
}

type SharedRoutes<R> = Arc<Mutex<Routes<R>>>;

/// Removes one subscription's routes when dropped, unless disarmed
///
/// Held by [`Subscriber::subscribe`] while it waits for the reply, so a
/// cancelled call leaves nothing behind.
struct RouteGuard<R: RecvStream> {
    id: u64,
    routes: SharedRoutes<R>,
    armed: bool,
}

impl<R: RecvStream> RouteGuard<R> {
    fn new(id: u64, routes: &SharedRoutes<R>) -> Self {
        Self {
            id,
            routes: Arc::clone(routes),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<R: RecvStream> Drop for RouteGuard<R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let id = self.id;
        if let Ok(mut routes) = self.routes.try_lock() {
            routes.pending.remove(&id);
            routes.tracks.remove(&id);
            return;
        }

        // Contended; finish the cleanup on the runtime
        let routes = Arc::clone(&self.routes);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let mut routes = routes.lock().await;
                routes.pending.remove(&id);
                routes.tracks.remove(&id);
            });
        }
    }
}

/// Subscribing side of a session
pub struct Subscriber<S: Session> {
    session: S,
    config: SessionConfig,
    control: ControlSender<S::SendStream>,
    routes: SharedRoutes<S::RecvStream>,
    next_id: AtomicU64,
    state: watch::Receiver<SessionState>,
}

impl<S: Session> Subscriber<S> {
    /// Accept the control stream and start the control and object loops
    ///
    /// An empty namespace in `config` accepts whatever the publisher
    /// announces; otherwise only that namespace is accepted.
    pub async fn connect(session: S, config: SessionConfig) -> Result<Self> {
        let (control, receiver) = channel::accept(&session).await?;
        let receiver = receiver.with_max_string(config.max_string_length);

        let (state_tx, state_rx) = watch::channel(SessionState::new());
        let routes: SharedRoutes<S::RecvStream> = Arc::new(Mutex::new(Routes::default()));

        let driver = ControlLoop {
            session: session.clone(),
            expected: config.namespace.clone(),
            control: control.clone(),
            receiver,
            routes: Arc::clone(&routes),
            state: state_tx,
        };
        tokio::spawn(driver.run());
        tokio::spawn(route_objects(
            ObjectReceiver::new(session.clone()),
            Arc::clone(&routes),
        ));

        Ok(Self {
            session,
            config,
            control,
            routes,
            next_id: AtomicU64::new(0),
            state: state_rx,
        })
    }

    /// Namespace accepted from the publisher, if any yet
    pub fn namespace(&self) -> Option<String> {
        self.state.borrow().namespace.clone()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch session state changes
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait for the publisher's announcement
    pub async fn announced(&self) -> Result<String> {
        let mut state = self.state.clone();
        let state = state
            .wait_for(|s| s.is_active() || s.is_closed())
            .await
            .map_err(|_| Error::SessionClosed)?;

        if state.is_closed() {
            return Err(Error::SessionClosed);
        }
        state.namespace.clone().ok_or(Error::SessionClosed)
    }

    /// Subscribe to a track in the announced namespace
    ///
    /// Waits for the announcement first, then for the publisher's answer.
    /// A `SUBSCRIBE_ERROR` comes back as [`Error::SubscribeRejected`] with
    /// the publisher's code and reason.
    pub async fn subscribe(&self, name: &str) -> Result<TrackReader<S::RecvStream>> {
        let namespace = self.announced().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (reply_tx, reply_rx) = oneshot::channel();
        let (objects_tx, objects_rx) = mpsc::channel(self.config.track_queue);

        {
            let mut routes = self.routes.lock().await;
            if routes.closed {
                return Err(Error::SessionClosed);
            }
            routes.pending.insert(id, reply_tx);
            routes.tracks.insert(id, objects_tx);
        }
        let guard = RouteGuard::new(id, &self.routes);

        self.control.subscribe(id, &namespace, name).await?;
        reply_rx.await.map_err(|_| Error::SessionClosed)??;
        guard.disarm();
        tracing::info!(id = id, namespace = %namespace, track = name, "Subscribed");

        Ok(TrackReader::new(
            id,
            name.to_string(),
            objects_rx,
            self.state.clone(),
        ))
    }

    /// Finish the control stream and close the session
    pub async fn close(self) -> Result<()> {
        let result = self.control.close().await;
        self.session.close(0, "subscriber closed").await;
        result
    }
}

/// Subscriber control loop
struct ControlLoop<S: Session> {
    session: S,
    /// Namespace to accept; empty accepts any
    expected: String,
    control: ControlSender<S::SendStream>,
    receiver: ControlReceiver<S::RecvStream>,
    routes: SharedRoutes<S::RecvStream>,
    state: watch::Sender<SessionState>,
}

impl<S: Session> ControlLoop<S> {
    async fn run(mut self) {
        let reason = match self.serve().await {
            Ok(()) => {
                tracing::info!("Control stream closed by peer");
                "control stream closed".to_string()
            }
            Err(e) => {
                tracing::error!(error = %e, "Session failed");
                e.to_string()
            }
        };

        self.state
            .send_modify(|state| *state = state.closed(reason.as_str()));

        {
            let mut routes = self.routes.lock().await;
            routes.closed = true;
            for (_, pending) in routes.pending.drain() {
                let _ = pending.send(Err(Error::SessionClosed));
            }
            // Dropping the senders ends every TrackReader
            routes.tracks.clear();
        }

        self.session.close(0, &reason).await;
    }

    async fn serve(&mut self) -> Result<()> {
        while let Some(msg) = self.receiver.recv().await? {
            self.handle(msg).await?;
        }
        Ok(())
    }

    async fn handle(&mut self, msg: Message) -> Result<()> {
        match msg {
            Message::Announce(announce) => {
                let current = self.state.borrow().namespace.clone();

                if let Some(current) = current {
                    tracing::warn!(
                        namespace = %announce.namespace,
                        current = %current,
                        "Rejecting second announcement"
                    );
                    return self
                        .control
                        .announce_error(
                            &announce.namespace,
                            CODE_ALREADY_ANNOUNCED,
                            "namespace already announced",
                        )
                        .await;
                }

                if !self.expected.is_empty() && announce.namespace != self.expected {
                    let e = Error::UnknownNamespace(announce.namespace.clone());
                    tracing::warn!(namespace = %announce.namespace, "Rejecting announcement");
                    return self
                        .control
                        .announce_error(&announce.namespace, CODE_UNKNOWN_NAMESPACE, &e.to_string())
                        .await;
                }

                self.control.announce_ok(&announce.namespace).await?;
                self.state
                    .send_modify(|state| *state = state.active(&announce.namespace));
                tracing::info!(namespace = %announce.namespace, "Announcement accepted");
                Ok(())
            }

            Message::SubscribeOk(ok) => {
                let pending = self.routes.lock().await.pending.remove(&ok.id);
                match pending {
                    Some(pending) => {
                        let _ = pending.send(Ok(()));
                    }
                    None => tracing::warn!(id = ok.id, "SUBSCRIBE_OK for unknown subscription"),
                }
                Ok(())
            }

            Message::SubscribeError(err) => {
                tracing::warn!(
                    id = err.id,
                    code = err.code,
                    reason = %err.reason,
                    "Subscription rejected"
                );

                let pending = {
                    let mut routes = self.routes.lock().await;
                    routes.tracks.remove(&err.id);
                    routes.pending.remove(&err.id)
                };

                if let Some(pending) = pending {
                    let _ = pending.send(Err(Error::SubscribeRejected {
                        id: err.id,
                        code: err.code,
                        reason: err.reason,
                    }));
                }
                Ok(())
            }

            other => Err(Error::UnhandledMessage(other.kind())),
        }
    }
}

/// Accept object streams until the session ends, routing each by track id
async fn route_objects<S: Session>(
    objects: ObjectReceiver<S>,
    routes: SharedRoutes<S::RecvStream>,
) {
    loop {
        let incoming = match objects.accept().await {
            Ok(Some(incoming)) => incoming,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Object loop stopped");
                break;
            }
        };

        let routes = Arc::clone(&routes);
        tokio::spawn(async move {
            let object = match incoming.header().await {
                Ok(object) => object,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping object");
                    return;
                }
            };

            let header = object.header;
            let track = routes.lock().await.tracks.get(&header.track).cloned();

            match track {
                Some(track) => {
                    tracing::debug!(
                        track = header.track,
                        group = header.group,
                        sequence = header.sequence,
                        "Object received"
                    );
                    // The reader may be gone; that only drops this object
                    let _ = track.send(object).await;
                }
                None => tracing::warn!(
                    track = header.track,
                    group = header.group,
                    "Dropping object for unknown subscription"
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SubscribeOk;
    use crate::object::{ObjectHeader, ObjectSender};
    use crate::transport::{MemoryRecvStream, MemorySendStream, MemorySession};

    async fn setup() -> (
        Subscriber<MemorySession>,
        MemorySession,
        ControlSender<MemorySendStream>,
        ControlReceiver<MemoryRecvStream>,
    ) {
        let (a, b) = MemorySession::pair();
        let (tx, rx) = channel::open(&a).await.unwrap();
        let subscriber = Subscriber::connect(b, SessionConfig::default())
            .await
            .unwrap();
        (subscriber, a, tx, rx)
    }

    #[tokio::test]
    async fn test_accepts_announcement() {
        let (subscriber, _a, tx, mut rx) = setup().await;

        tx.announce("live").await.unwrap();
        assert_eq!(subscriber.announced().await.unwrap(), "live");
        assert!(matches!(
            rx.recv().await.unwrap(),
            Some(Message::AnnounceOk(ok)) if ok.namespace == "live"
        ));
    }

    #[tokio::test]
    async fn test_second_announcement_rejected() {
        let (subscriber, _a, tx, mut rx) = setup().await;

        tx.announce("live").await.unwrap();
        tx.announce("other").await.unwrap();

        assert!(matches!(rx.recv().await.unwrap(), Some(Message::AnnounceOk(_))));
        match rx.recv().await.unwrap() {
            Some(Message::AnnounceError(err)) => {
                assert_eq!(err.namespace, "other");
                assert_eq!(err.code, CODE_ALREADY_ANNOUNCED);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert_eq!(subscriber.namespace().as_deref(), Some("live"));
    }

    #[tokio::test]
    async fn test_expected_namespace() {
        let (a, b) = MemorySession::pair();
        let (tx, mut rx) = channel::open(&a).await.unwrap();
        let _subscriber = Subscriber::connect(b, SessionConfig::with_namespace("live"))
            .await
            .unwrap();

        tx.announce("sports").await.unwrap();
        match rx.recv().await.unwrap() {
            Some(Message::AnnounceError(err)) => assert_eq!(err.code, CODE_UNKNOWN_NAMESPACE),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subscribe_routes_objects() {
        let (subscriber, a, tx, mut rx) = setup().await;
        tx.announce("live").await.unwrap();

        let publisher = tokio::spawn(async move {
            rx.recv().await.unwrap();
            match rx.recv().await.unwrap() {
                Some(Message::Subscribe(sub)) => {
                    assert_eq!(sub.namespace, "live");
                    assert_eq!(sub.name, "catalog");
                    tx.send(SubscribeOk { id: sub.id }).await.unwrap();
                    // Hand the control stream back so it stays open
                    (sub.id, tx, rx)
                }
                other => panic!("unexpected message: {:?}", other),
            }
        });

        let mut track = subscriber.subscribe("catalog").await.unwrap();
        let (id, _tx, _rx) = publisher.await.unwrap();
        assert_eq!(track.id(), id);

        // One object for an unknown id, one for the track
        let sender = ObjectSender::new(a);
        let stray = sender.send(ObjectHeader::new(99, 0, 0, 0)).await.unwrap();
        stray.finish().await.unwrap();

        let mut writer = sender.send(ObjectHeader::new(id, 0, 0, 0)).await.unwrap();
        writer.write(b"CATALOG-BYTES").await.unwrap();
        writer.finish().await.unwrap();

        let mut object = track.next_object().await.unwrap();
        assert_eq!(object.header, ObjectHeader::new(id, 0, 0, 0));
        assert_eq!(&object.read_to_end().await.unwrap()[..], b"CATALOG-BYTES");
    }

    #[tokio::test]
    async fn test_rejection_carries_peer_reason() {
        let (subscriber, _a, tx, mut rx) = setup().await;
        tx.announce("live").await.unwrap();

        tokio::spawn(async move {
            rx.recv().await.unwrap();
            if let Some(Message::Subscribe(sub)) = rx.recv().await.unwrap() {
                tx.subscribe_error(sub.id, 3, "duplicate track name: video")
                    .await
                    .unwrap();
            }
            // Keep the control stream open
            std::future::pending::<()>().await;
        });

        match subscriber.subscribe("video").await {
            Err(Error::SubscribeRejected { code, reason, .. }) => {
                assert_eq!(code, 3);
                assert_eq!(reason, "duplicate track name: video");
            }
            other => panic!("unexpected result: {:?}", other.map(|t| t.id())),
        }
        assert!(subscriber.state().is_active());
    }

    #[tokio::test]
    async fn test_control_closure_fails_subscriptions() {
        let (subscriber, _a, tx, mut rx) = setup().await;
        tx.announce("live").await.unwrap();

        tokio::spawn(async move {
            rx.recv().await.unwrap();
            rx.recv().await.unwrap();
            tx.close().await.unwrap();
        });

        assert!(matches!(
            subscriber.subscribe("video").await,
            Err(Error::SessionClosed)
        ));

        let mut state = subscriber.watch_state();
        state.wait_for(|s| s.is_closed()).await.unwrap();
        assert!(matches!(
            subscriber.subscribe("audio").await,
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_subscribe_removes_routes() {
        let (subscriber, _a, tx, mut rx) = setup().await;
        tx.announce("live").await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), Some(Message::AnnounceOk(_))));

        // The publisher never answers, so the call is abandoned
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            subscriber.subscribe("video"),
        )
        .await;
        assert!(result.is_err());
        assert!(matches!(rx.recv().await.unwrap(), Some(Message::Subscribe(_))));

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                {
                    let routes = subscriber.routes.lock().await;
                    if routes.pending.is_empty() && routes.tracks.is_empty() {
                        break;
                    }
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // A late reply for the abandoned id is ignored
        tx.send(SubscribeOk { id: 0 }).await.unwrap();
        assert!(subscriber.state().is_active());
    }

    #[tokio::test]
    async fn test_unhandled_message_is_fatal() {
        let (subscriber, _a, tx, _rx) = setup().await;

        tx.subscribe(0, "live", "video").await.unwrap();

        let mut state = subscriber.watch_state();
        let state = state.wait_for(|s| s.is_closed()).await.unwrap();
        assert!(state
            .close_reason
            .as_deref()
            .unwrap()
            .contains("SUBSCRIBE"));
    }
}
