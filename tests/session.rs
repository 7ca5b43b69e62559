//! Publisher and subscriber talking over an in-memory session

use std::time::Duration;

use moq_live::control::{channel, Message, SubscribeError};
use moq_live::error::{Error, CODE_DUPLICATE_NAME, CODE_UNKNOWN_NAMESPACE};
use moq_live::object::{ObjectHeader, ObjectReceiver, ObjectSender};
use moq_live::session::{Publisher, PublisherEvent, SessionConfig, Subscriber};
use moq_live::transport::MemorySession;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn connect() -> (
    Publisher<MemorySession>,
    tokio::sync::mpsc::Receiver<PublisherEvent>,
    Subscriber<MemorySession>,
) {
    init_tracing();

    let (a, b) = MemorySession::pair();
    let (publisher, events) = Publisher::connect(a, SessionConfig::with_namespace("live"))
        .await
        .unwrap();
    let subscriber = Subscriber::connect(b, SessionConfig::default())
        .await
        .unwrap();

    (publisher, events, subscriber)
}

#[tokio::test]
async fn catalog_object_arrives_unchanged() {
    init_tracing();
    let (a, b) = MemorySession::pair();

    let (publisher, _events) = Publisher::connect(a, SessionConfig::with_namespace("live"))
        .await
        .unwrap();

    // Drive the subscriber side by hand to check the exact wire exchange
    let (control, mut replies) = channel::accept(&b).await.unwrap();
    match replies.recv().await.unwrap() {
        Some(Message::Announce(announce)) => assert_eq!(announce.namespace, "live"),
        other => panic!("expected ANNOUNCE, got {:?}", other),
    }

    control.announce_ok("live").await.unwrap();
    control.subscribe(0, "live", "catalog").await.unwrap();
    match replies.recv().await.unwrap() {
        Some(Message::SubscribeOk(ok)) => assert_eq!(ok.id, 0),
        other => panic!("expected SUBSCRIBE_OK, got {:?}", other),
    }
    assert_eq!(publisher.subscription("catalog").await, Some(0));

    let header = ObjectHeader::new(0, 0, 0, 0);
    let mut writer = publisher.send_object(header).await.unwrap();
    writer.write(b"CATALOG-BYTES").await.unwrap();
    writer.finish().await.unwrap();

    let mut object = ObjectReceiver::new(b).recv().await.unwrap().unwrap();
    assert_eq!(object.header, header);
    assert_eq!(&object.read_to_end().await.unwrap()[..], b"CATALOG-BYTES");
}

#[tokio::test]
async fn drivers_exchange_catalog() {
    let (publisher, mut events, subscriber) = connect().await;

    assert_eq!(subscriber.announced().await.unwrap(), "live");
    assert_eq!(
        events.recv().await,
        Some(PublisherEvent::Announced {
            namespace: "live".into()
        })
    );

    let mut reader = subscriber.subscribe("catalog").await.unwrap();
    assert_eq!(reader.id(), 0);
    assert_eq!(
        events.recv().await,
        Some(PublisherEvent::Subscribed {
            id: 0,
            name: "catalog".into()
        })
    );

    let writer = publisher.track("catalog").await.unwrap();
    let mut object = writer.object(0, 0, 0).await.unwrap();
    object.write(b"CATALOG-BYTES").await.unwrap();
    object.finish().await.unwrap();

    let mut received = reader.next_object().await.unwrap();
    assert_eq!(received.header, ObjectHeader::new(0, 0, 0, 0));
    assert_eq!(&received.read_to_end().await.unwrap()[..], b"CATALOG-BYTES");
}

#[tokio::test]
async fn duplicate_track_is_rejected_not_fatal() {
    let (_publisher, _events, subscriber) = connect().await;

    let first = subscriber.subscribe("video").await.unwrap();
    assert_eq!(first.id(), 0);

    match subscriber.subscribe("video").await {
        Err(Error::SubscribeRejected { id, code, reason }) => {
            assert_eq!(id, 1);
            assert_eq!(code, CODE_DUPLICATE_NAME);
            assert!(reason.contains("duplicate track name"), "{}", reason);
        }
        other => panic!("expected rejection, got {:?}", other.map(|t| t.id())),
    }

    // The session is still usable
    let audio = subscriber.subscribe("audio").await.unwrap();
    assert_eq!(audio.id(), 2);
    assert!(subscriber.state().is_active());
}

#[tokio::test]
async fn unknown_namespace_is_rejected() {
    init_tracing();
    let (a, b) = MemorySession::pair();
    let (_publisher, _events) = Publisher::connect(a, SessionConfig::with_namespace("live"))
        .await
        .unwrap();

    let (control, mut replies) = channel::accept(&b).await.unwrap();
    replies.recv().await.unwrap();

    control.subscribe(4, "sports", "video").await.unwrap();
    assert_eq!(
        replies.recv().await.unwrap(),
        Some(Message::SubscribeError(SubscribeError {
            id: 4,
            code: CODE_UNKNOWN_NAMESPACE,
            reason: "unknown namespace: sports".into(),
        }))
    );

    // A later valid subscription still succeeds
    control.subscribe(5, "live", "video").await.unwrap();
    assert!(matches!(
        replies.recv().await.unwrap(),
        Some(Message::SubscribeOk(ok)) if ok.id == 5
    ));
}

#[tokio::test]
async fn control_closure_ends_tracks() {
    let (publisher, mut events, subscriber) = connect().await;

    let mut reader = subscriber.subscribe("video").await.unwrap();
    while let Some(event) = events.recv().await {
        if matches!(event, PublisherEvent::Subscribed { .. }) {
            break;
        }
    }

    publisher.close().await.unwrap();

    let next = tokio::time::timeout(Duration::from_secs(5), reader.next_object())
        .await
        .unwrap();
    assert!(next.is_none());
    assert_eq!(reader.close_reason().as_deref(), Some("control stream closed"));

    assert!(matches!(
        subscriber.subscribe("audio").await,
        Err(Error::SessionClosed)
    ));
}

#[tokio::test]
async fn aborted_object_does_not_end_track() {
    let (publisher, _events, subscriber) = connect().await;

    let mut reader = subscriber.subscribe("video").await.unwrap();
    let writer = publisher.track("video").await.unwrap();

    let mut broken = writer.object(0, 0, 0).await.unwrap();
    broken.write(b"partial").await.unwrap();
    broken.abort(moq_live::object::ABORT_CODE);

    let mut first = reader.next_object().await.unwrap();
    assert!(matches!(
        first.read_to_end().await,
        Err(Error::ObjectAborted(_))
    ));

    let mut good = writer.object(1, 0, 0).await.unwrap();
    good.write(b"whole").await.unwrap();
    good.finish().await.unwrap();

    let mut second = reader.next_object().await.unwrap();
    assert_eq!(second.header.group, 1);
    assert_eq!(&second.read_to_end().await.unwrap()[..], b"whole");
}

#[tokio::test]
async fn malformed_object_is_dropped() {
    let (a, b) = MemorySession::pair();
    init_tracing();

    let (publisher, _events) = Publisher::connect(a.clone(), SessionConfig::with_namespace("live"))
        .await
        .unwrap();
    let subscriber = Subscriber::connect(b, SessionConfig::default())
        .await
        .unwrap();

    let mut reader = subscriber.subscribe("video").await.unwrap();

    // A stream that ends inside the header
    {
        use tokio::io::AsyncWriteExt;
        use moq_live::transport::Session;

        let mut stream = a.open_uni().await.unwrap();
        stream.write_all(&[0x40]).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    let sender = ObjectSender::new(a);
    let mut object = sender.send(ObjectHeader::new(0, 3, 0, 0)).await.unwrap();
    object.write(b"ok").await.unwrap();
    object.finish().await.unwrap();

    let mut received = reader.next_object().await.unwrap();
    assert_eq!(received.header.group, 3);
    assert_eq!(&received.read_to_end().await.unwrap()[..], b"ok");
    assert!(!publisher.state().is_closed());
}
