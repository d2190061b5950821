//! # Event Subscriber
//!
//! A [`Subscription`] skips events its filter rejects. A subscription that
//! falls more than the bus capacity behind loses the oldest notifications;
//! the loss is counted rather than reported as an error.

use crate::events::{EngineEvent, EventFilter};
use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Event bus closed")]
    Closed,
}

pub struct Subscription {
    receiver: Receiver<EngineEvent>,
    filter: EventFilter,
    missed: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: Receiver<EngineEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            missed: 0,
        }
    }

    fn note_missed(&mut self, count: u64) {
        self.missed += count;
        debug!(missed = count, total = self.missed, "[bus] subscription lagged");
    }

    /// Next matching event; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(count)) => self.note_missed(count),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Result<Option<EngineEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(count)) => self.note_missed(count),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Every matching event buffered right now.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::iter::from_fn(|| self.try_recv().ok().flatten()).collect()
    }

    /// Notifications lost to lag so far.
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use std::time::Duration;
    use tokio::time::timeout;

    fn failure(policy: &str) -> EngineEvent {
        EngineEvent::BlockError {
            policy_id: policy.into(),
            block_id: "split-id".into(),
            block_type: "splitBlock".into(),
            user: "did:a".into(),
            message: "Option \"threshold\" is not set".into(),
        }
    }

    #[tokio::test]
    async fn test_recv_skips_filtered_topics() {
        let bus = InMemoryEventBus::new();
        let mut errors = bus.subscribe(EventFilter::topics(vec![EventTopic::BlockErrors]));

        bus.publish(EngineEvent::PolicyActivated {
            policy_id: "p".into(),
        })
        .await;
        bus.publish(failure("p")).await;

        let received = timeout(Duration::from_millis(100), errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, failure("p"));
    }

    #[tokio::test]
    async fn test_policy_filter_and_drain() {
        let bus = InMemoryEventBus::new();
        let mut p1 = bus.subscribe(EventFilter::policy("p1"));
        bus.publish(failure("p1")).await;
        bus.publish(failure("p2")).await;
        bus.publish(failure("p1")).await;

        assert_eq!(p1.drain().len(), 2);
        assert!(matches!(p1.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_lag_is_counted() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());
        for _ in 0..5 {
            bus.publish(failure("p")).await;
        }

        assert_eq!(sub.drain().len(), 2);
        assert_eq!(sub.missed(), 3);
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        assert_eq!(bus.subscriber_count(), 1);
        drop(bus);

        assert_eq!(sub.recv().await, None);
        assert_eq!(sub.try_recv(), Err(SubscriptionError::Closed));
    }
}
