//! Publisher session driver
//!
//! Announces one namespace, answers subscriptions against it and hands out
//! [`TrackWriter`]s for the tracks that were subscribed.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::control::{channel, ControlReceiver, ControlSender, Message, Subscribe};
use crate::error::{Error, Result};
use crate::object::{ObjectHeader, ObjectSender, ObjectWriter};
use crate::registry::SubscriptionRegistry;
use crate::transport::Session;

use super::config::SessionConfig;
use super::state::SessionState;
use super::track::TrackWriter;

/// Events from the publisher control loop
#[derive(Debug, Clone, PartialEq)]
pub enum PublisherEvent {
    /// The subscriber accepted the namespace
    Announced { namespace: String },

    /// The subscriber rejected the namespace; the session is closing
    AnnounceRejected { code: u64, reason: String },

    /// A subscription was accepted
    Subscribed { id: u64, name: String },

    /// The session ended
    Closed { reason: String },
}

/// Publishing side of a session
///
/// # Example
/// ```no_run
/// use moq_live::session::{Publisher, SessionConfig};
/// use moq_live::transport::MemorySession;
///
/// # async fn example(session: MemorySession) -> moq_live::error::Result<()> {
/// let (publisher, mut events) =
///     Publisher::connect(session, SessionConfig::with_namespace("live")).await?;
///
/// while let Some(event) = events.recv().await {
///     println!("Event: {:?}", event);
/// }
/// # drop(publisher);
/// # Ok(())
/// # }
/// ```
pub struct Publisher<S: Session> {
    session: S,
    config: SessionConfig,
    control: ControlSender<S::SendStream>,
    registry: Arc<SubscriptionRegistry>,
    objects: ObjectSender<S>,
    state: watch::Receiver<SessionState>,
}

impl<S: Session> Publisher<S> {
    /// Open the control stream, announce the namespace and start the
    /// control loop.
    ///
    /// Returns the publisher and a receiver for its events.
    pub async fn connect(
        session: S,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<PublisherEvent>)> {
        let (control, receiver) = channel::open(&session).await?;
        let receiver = receiver.with_max_string(config.max_string_length);

        control.announce(&config.namespace).await?;
        tracing::info!(namespace = %config.namespace, "Namespace announced");

        let (state_tx, state_rx) =
            watch::channel(SessionState::new().announcing(&config.namespace));
        let (event_tx, event_rx) = mpsc::channel(config.event_queue);
        let registry = Arc::new(SubscriptionRegistry::new());

        let driver = ControlLoop {
            session: session.clone(),
            namespace: config.namespace.clone(),
            control: control.clone(),
            receiver,
            registry: Arc::clone(&registry),
            state: state_tx,
            events: event_tx,
        };
        tokio::spawn(driver.run());

        let publisher = Self {
            objects: ObjectSender::new(session.clone()),
            session,
            config,
            control,
            registry,
            state: state_rx,
        };

        Ok((publisher, event_rx))
    }

    /// The announced namespace
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch session state changes
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Subscription id for a track, if it has been subscribed
    pub async fn subscription(&self, name: &str) -> Option<u64> {
        self.registry.lookup(name).await
    }

    /// Number of accepted subscriptions
    pub async fn subscriptions(&self) -> usize {
        self.registry.len().await
    }

    /// Writer for a subscribed track
    ///
    /// Returns `None` until the subscriber has subscribed to `name`.
    pub async fn track(&self, name: &str) -> Option<TrackWriter<S>> {
        let id = self.registry.lookup(name).await?;
        Some(TrackWriter::new(
            id,
            name.to_string(),
            self.objects.clone(),
            self.config.default_priority,
        ))
    }

    /// Open one object directly
    pub async fn send_object(&self, header: ObjectHeader) -> Result<ObjectWriter<S::SendStream>> {
        if self.state.borrow().is_closed() {
            return Err(Error::SessionClosed);
        }
        self.objects.send(header).await
    }

    /// Finish the control stream and close the session
    pub async fn close(self) -> Result<()> {
        let result = self.control.close().await;
        self.session.close(0, "publisher closed").await;
        result
    }
}

/// Publisher control loop, owns the receiving half of the control stream
struct ControlLoop<S: Session> {
    session: S,
    namespace: String,
    control: ControlSender<S::SendStream>,
    receiver: ControlReceiver<S::RecvStream>,
    registry: Arc<SubscriptionRegistry>,
    state: watch::Sender<SessionState>,
    events: mpsc::Sender<PublisherEvent>,
}

impl<S: Session> ControlLoop<S> {
    async fn run(mut self) {
        let reason = match self.serve().await {
            Ok(()) => {
                tracing::info!(namespace = %self.namespace, "Control stream closed by peer");
                "control stream closed".to_string()
            }
            Err(e) => {
                tracing::error!(namespace = %self.namespace, error = %e, "Session failed");
                e.to_string()
            }
        };

        self.state.send_modify(|state| *state = state.closed(reason.as_str()));
        self.emit(PublisherEvent::Closed {
            reason: reason.clone(),
        });
        self.session.close(0, &reason).await;
    }

    /// Queue an event without waiting on the receiver
    ///
    /// A full queue drops the event so that control replies are never held
    /// up by a slow or idle event consumer.
    fn emit(&self, event: PublisherEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(?event, "Event queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    async fn serve(&mut self) -> Result<()> {
        while let Some(msg) = self.receiver.recv().await? {
            self.handle(msg).await?;
        }
        Ok(())
    }

    async fn handle(&mut self, msg: Message) -> Result<()> {
        match msg {
            Message::Subscribe(subscribe) => self.on_subscribe(subscribe).await,

            Message::AnnounceOk(ok) => {
                if ok.namespace != self.namespace {
                    tracing::warn!(
                        namespace = %ok.namespace,
                        "ANNOUNCE_OK for a namespace that was not announced"
                    );
                    return Ok(());
                }

                self.state
                    .send_modify(|state| *state = state.active(&ok.namespace));
                tracing::info!(namespace = %ok.namespace, "Announcement accepted");

                self.emit(PublisherEvent::Announced {
                    namespace: ok.namespace,
                });
                Ok(())
            }

            Message::AnnounceError(err) => {
                tracing::warn!(
                    namespace = %err.namespace,
                    code = err.code,
                    reason = %err.reason,
                    "Announcement rejected"
                );

                self.emit(PublisherEvent::AnnounceRejected {
                    code: err.code,
                    reason: err.reason.clone(),
                });

                Err(Error::AnnounceRejected {
                    namespace: err.namespace,
                    code: err.code,
                    reason: err.reason,
                })
            }

            other => Err(Error::UnhandledMessage(other.kind())),
        }
    }

    /// Answer one SUBSCRIBE; rejections never end the session
    async fn on_subscribe(&mut self, subscribe: Subscribe) -> Result<()> {
        match accept(&self.namespace, &self.registry, &subscribe).await {
            Ok(()) => {
                self.control.subscribe_ok(subscribe.id).await?;
                tracing::info!(
                    id = subscribe.id,
                    track = %subscribe.name,
                    "Subscription accepted"
                );

                self.emit(PublisherEvent::Subscribed {
                    id: subscribe.id,
                    name: subscribe.name,
                });
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    id = subscribe.id,
                    namespace = %subscribe.namespace,
                    track = %subscribe.name,
                    code = e.code(),
                    reason = %reason,
                    "Subscription rejected"
                );
                self.control
                    .subscribe_error(subscribe.id, e.code(), &reason)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Check a SUBSCRIBE against the announced namespace and register it
async fn accept(
    namespace: &str,
    registry: &SubscriptionRegistry,
    subscribe: &Subscribe,
) -> Result<()> {
    if subscribe.namespace != namespace {
        return Err(Error::UnknownNamespace(subscribe.namespace.clone()));
    }

    registry.register(&subscribe.name, subscribe.id).await?;
    Ok(())
}
