//! # Engine Events
//!
//! Notifications published by running policy trees.

use serde::{Deserialize, Serialize};

/// All events that can be published to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    // =========================================================================
    // BLOCK NOTIFICATIONS
    // =========================================================================
    /// A block's rendering changed for the listed users.
    BlockUpdated {
        policy_id: String,
        block_id: String,
        tag: Option<String>,
        /// DIDs that should re-fetch the block.
        users: Vec<String>,
    },

    /// A block action failed for one user.
    BlockError {
        policy_id: String,
        block_id: String,
        block_type: String,
        /// DID of the acting user.
        user: String,
        message: String,
    },

    // =========================================================================
    // POLICY LIFECYCLE
    // =========================================================================
    /// A policy tree was built and started.
    PolicyActivated { policy_id: String },

    /// A policy tree was destroyed.
    PolicyDeactivated { policy_id: String },
}

impl EngineEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::BlockUpdated { .. } => EventTopic::BlockUpdates,
            Self::BlockError { .. } => EventTopic::BlockErrors,
            Self::PolicyActivated { .. } | Self::PolicyDeactivated { .. } => {
                EventTopic::PolicyLifecycle
            }
        }
    }

    /// Policy the event belongs to.
    #[must_use]
    pub fn policy_id(&self) -> &str {
        match self {
            Self::BlockUpdated { policy_id, .. }
            | Self::BlockError { policy_id, .. }
            | Self::PolicyActivated { policy_id }
            | Self::PolicyDeactivated { policy_id } => policy_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Re-render notifications.
    BlockUpdates,
    /// Failed block actions.
    BlockErrors,
    /// Activation and deactivation.
    PolicyLifecycle,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Policies to include. Empty means all policies.
    pub policies: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            policies: Vec::new(),
        }
    }

    /// Create a filter for one policy.
    #[must_use]
    pub fn policy(policy_id: impl Into<String>) -> Self {
        Self {
            topics: Vec::new(),
            policies: vec![policy_id.into()],
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &EngineEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let policy_match = self.policies.is_empty()
            || self.policies.iter().any(|p| p == event.policy_id());

        topic_match && policy_match
    }
}
