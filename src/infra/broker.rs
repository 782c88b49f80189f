use anyhow::Result;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

use crate::domain::realtime::{Group, GroupEvent};
use crate::infra::cache::RedisCache;

const CHANNEL_PREFIX: &str = "snapgram:group:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<GroupEvent>,
}

/// A live membership in one group. Events arrive on `receiver` until the
/// subscription is passed back to [`Broker::leave`].
pub struct Subscription {
    pub group: Group,
    pub id: SubscriberId,
    pub receiver: UnboundedReceiver<GroupEvent>,
}

/// Process-local fan-out table: group -> connected subscribers.
#[derive(Default, Clone)]
pub struct GroupRegistry {
    inner: Arc<RwLock<HashMap<Group, Vec<Subscriber>>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_subscriber(&self, group: Group) -> Subscription {
        let (tx, rx) = unbounded_channel();
        let id = SubscriberId::new();

        let mut guard = self.inner.write().await;
        let members = guard.entry(group).or_default();
        members.push(Subscriber { id, sender: tx });

        tracing::debug!(
            group = %group.name(),
            subscriber = ?id,
            subscribers = members.len(),
            "joined group"
        );

        Subscription {
            group,
            id,
            receiver: rx,
        }
    }

    pub async fn remove_subscriber(&self, group: Group, id: SubscriberId) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.get_mut(&group) {
            members.retain(|member| member.id != id);
            if members.is_empty() {
                guard.remove(&group);
                tracing::debug!(group = %group.name(), "removed empty group");
            }
        }
    }

    /// Delivers `event` to every live subscriber, dropping closed ones.
    pub async fn broadcast(&self, group: Group, event: &GroupEvent) -> usize {
        let mut guard = self.inner.write().await;
        let Some(members) = guard.get_mut(&group) else {
            return 0;
        };

        let before = members.len();
        members.retain(|member| member.sender.send(event.clone()).is_ok());
        let delivered = members.len();
        if delivered != before {
            tracing::debug!(
                group = %group.name(),
                dropped = before - delivered,
                "pruned closed subscribers"
            );
        }
        if members.is_empty() {
            guard.remove(&group);
        }
        delivered
    }

    #[cfg(test)]
    async fn subscriber_count(&self, group: Group) -> usize {
        let guard = self.inner.read().await;
        guard.get(&group).map(|members| members.len()).unwrap_or(0)
    }
}

/// Group broadcast layer used by live connections and request handlers.
///
/// Without a relay, `publish` hands events straight to the local registry.
/// With a Redis relay, events go out over `PUBLISH` and come back in through
/// [`Broker::run_relay`] on every process, this one included.
#[derive(Clone)]
pub struct Broker {
    registry: GroupRegistry,
    relay: Option<RedisCache>,
}

impl Broker {
    pub fn in_memory() -> Self {
        Self {
            registry: GroupRegistry::new(),
            relay: None,
        }
    }

    pub fn redis(cache: RedisCache) -> Self {
        Self {
            registry: GroupRegistry::new(),
            relay: Some(cache),
        }
    }

    pub fn uses_relay(&self) -> bool {
        self.relay.is_some()
    }

    pub async fn join(&self, group: Group) -> Subscription {
        self.registry.add_subscriber(group).await
    }

    pub async fn leave(&self, subscription: Subscription) {
        let Subscription { group, id, mut receiver } = subscription;
        receiver.close();
        self.registry.remove_subscriber(group, id).await;
    }

    pub async fn publish(&self, group: Group, event: GroupEvent) -> Result<()> {
        match &self.relay {
            Some(cache) => {
                let payload = serde_json::to_string(&event)?;
                cache.publish(&channel_for(group), &payload).await
            }
            None => {
                self.registry.broadcast(group, &event).await;
                Ok(())
            }
        }
    }

    /// Forwards relayed events into the local registry until the pub/sub
    /// connection ends. Returns immediately for the in-memory backend.
    pub async fn run_relay(&self) -> Result<()> {
        let Some(cache) = &self.relay else {
            return Ok(());
        };

        let conn = cache.client().get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.psubscribe(format!("{}*", CHANNEL_PREFIX)).await?;
        tracing::info!("broker relay subscribed");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let channel = msg.get_channel_name().to_string();
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(error = ?err, channel = %channel, "unreadable relay payload");
                    continue;
                }
            };
            let Some(group) = group_from_channel(&channel) else {
                continue;
            };
            match serde_json::from_str::<GroupEvent>(&payload) {
                Ok(event) => {
                    self.registry.broadcast(group, &event).await;
                }
                Err(err) => {
                    tracing::warn!(error = ?err, channel = %channel, "malformed relay event");
                }
            }
        }

        Ok(())
    }
}

fn channel_for(group: Group) -> String {
    format!("{}{}", CHANNEL_PREFIX, group.name())
}

fn group_from_channel(channel: &str) -> Option<Group> {
    channel.strip_prefix(CHANNEL_PREFIX).and_then(Group::parse)
}
