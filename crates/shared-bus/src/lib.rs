//! # Shared Bus - Notifications from the Policy Engine
//!
//! The engine never calls into the API/UI layer directly. Blocks that need
//! to tell users "re-render me" or "your action failed" publish an
//! [`EngineEvent`] here; whoever serves users subscribes.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Policy tree  │                    │  API / UI    │
//! │   (blocks)   │    publish()       │   layer      │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! The bus is injected into each policy tree at construction; there is no
//! process-wide notifier.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EngineEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Events buffered per subscription before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
