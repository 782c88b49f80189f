//! Realtime Tests
//!
//! Covers group delivery through the Redis relay backend.

mod common;

use std::time::Duration;

use common::app;
use snapgram::domain::realtime::{Group, GroupEvent, NotificationEvent};
use snapgram::infra::broker::{Broker, Subscription};
use uuid::Uuid;

fn notice(text: &str) -> GroupEvent {
    GroupEvent::Notification(NotificationEvent {
        title: "Relay".into(),
        text: text.into(),
        created_at: "2024-01-01T00:00:00Z".into(),
    })
}

/// Publishes until `subscription` sees the event. The relay subscribes in the
/// background, so early publishes can go out before it is listening.
async fn publish_until_received(
    publisher: &Broker,
    group: Group,
    event: GroupEvent,
    subscription: &mut Subscription,
) -> GroupEvent {
    for _ in 0..50 {
        publisher.publish(group, event.clone()).await.unwrap();
        if let Ok(Some(received)) =
            tokio::time::timeout(Duration::from_millis(100), subscription.receiver.recv()).await
        {
            return received;
        }
    }
    panic!("relay never delivered to {}", group.name());
}

#[tokio::test]
async fn relay_delivers_across_broker_instances() {
    let app = app().await;
    let sender = Broker::redis(app.state.cache.clone());
    let receiver = Broker::redis(app.state.cache.clone());
    assert!(sender.uses_relay());

    let relay = tokio::spawn({
        let receiver = receiver.clone();
        async move { receiver.run_relay().await }
    });

    let group = Group::Notifications(Uuid::new_v4());
    let mut member = receiver.join(group).await;
    let mut outsider = receiver.join(Group::Notifications(Uuid::new_v4())).await;

    let event = notice("across processes");
    let received = publish_until_received(&sender, group, event.clone(), &mut member).await;
    assert_eq!(received, event);
    assert!(outsider.receiver.try_recv().is_err());

    receiver.leave(member).await;
    receiver.leave(outsider).await;
    relay.abort();
}

#[tokio::test]
async fn relay_does_not_deliver_locally_without_running() {
    let app = app().await;
    let broker = Broker::redis(app.state.cache.clone());
    let group = Group::Chat(Uuid::new_v4());
    let mut member = broker.join(group).await;

    // With a relay configured, events only come back through run_relay.
    broker.publish(group, notice("unrelayed")).await.unwrap();
    assert!(member.receiver.try_recv().is_err());

    broker.leave(member).await;
}
