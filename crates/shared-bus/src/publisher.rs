//! # Event Publisher
//!
//! Policy trees publish through [`EventPublisher`]; [`InMemoryEventBus`] fans
//! every notification out to all live subscriptions over a tokio broadcast
//! channel. Notifications are best effort: with nobody listening they are
//! counted and dropped.

use crate::events::{EngineEvent, EventFilter, EventTopic};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Publishing side of the bus, injected into each policy tree.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Returns how many subscriptions the event reached.
    async fn publish(&self, event: EngineEvent) -> usize;

    /// Events handed to the bus so far, delivered or not.
    fn events_published(&self) -> u64;
}

/// Per-topic publish counters.
#[derive(Default)]
struct TopicCounters {
    updates: AtomicU64,
    errors: AtomicU64,
    lifecycle: AtomicU64,
}

impl TopicCounters {
    fn slot(&self, topic: EventTopic) -> Option<&AtomicU64> {
        match topic {
            EventTopic::BlockUpdates => Some(&self.updates),
            EventTopic::BlockErrors => Some(&self.errors),
            EventTopic::PolicyLifecycle => Some(&self.lifecycle),
            EventTopic::All => None,
        }
    }

    fn total(&self) -> u64 {
        [&self.updates, &self.errors, &self.lifecycle]
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }
}

pub struct InMemoryEventBus {
    sender: broadcast::Sender<EngineEvent>,
    counters: TopicCounters,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// `capacity` events are buffered per subscription before the slowest
    /// one starts missing notifications.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            counters: TopicCounters::default(),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, policies = ?filter.policies, "[bus] subscription opened");
        Subscription::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events published on one topic. `EventTopic::All` gives the total.
    #[must_use]
    pub fn published_on(&self, topic: EventTopic) -> u64 {
        self.counters
            .slot(topic)
            .map_or_else(|| self.counters.total(), |c| c.load(Ordering::Relaxed))
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EngineEvent) -> usize {
        let topic = event.topic();
        if let Some(counter) = self.counters.slot(topic) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        let policy_id = event.policy_id().to_string();
        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(?topic, policy_id = %policy_id, receivers, "[bus] event published");
                receivers
            }
            Err(_) => {
                trace!(?topic, policy_id = %policy_id, "[bus] no subscribers, event dropped");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.counters.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activated() -> EngineEvent {
        EngineEvent::PolicyActivated {
            policy_id: "p".into(),
        }
    }

    fn updated() -> EngineEvent {
        EngineEvent::BlockUpdated {
            policy_id: "p".into(),
            block_id: "container".into(),
            tag: Some("root".into()),
            users: vec!["did:a".into()],
        }
    }

    #[tokio::test]
    async fn test_unheard_events_still_counted() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(activated()).await, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_every_subscription_receives() {
        let bus = InMemoryEventBus::new();
        let _all = bus.subscribe(EventFilter::all());
        let _errors = bus.subscribe(EventFilter::topics(vec![EventTopic::BlockErrors]));

        // filters apply on receive
        assert_eq!(bus.publish(activated()).await, 2);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_counts_per_topic() {
        let bus = InMemoryEventBus::with_capacity(8);
        bus.publish(activated()).await;
        bus.publish(updated()).await;
        bus.publish(updated()).await;

        assert_eq!(bus.published_on(EventTopic::BlockUpdates), 2);
        assert_eq!(bus.published_on(EventTopic::PolicyLifecycle), 1);
        assert_eq!(bus.published_on(EventTopic::BlockErrors), 0);
        assert_eq!(bus.published_on(EventTopic::All), 3);
        assert_eq!(bus.capacity(), 8);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        assert_eq!(InMemoryEventBus::with_capacity(0).capacity(), 1);
    }
}
