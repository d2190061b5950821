//! # Shared Types Crate
//!
//! This crate contains the policy configuration model, the policy user and
//! document entities, and the errors shared by every engine crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the JSON block tree authored by the policy
//!   editor deserializes into [`BlockConfig`] here and nowhere else.
//! - **Wire Compatibility**: field names follow the persisted camelCase form.
//! - **No Behavior**: entities carry data and lookups only; execution lives in
//!   the engine crates.

pub mod config;
pub mod entities;
pub mod errors;
pub mod permissions;

pub use config::{BlockConfig, EventActor, EventConfig, PolicyConfig, PolicyEventType, PolicyStatus};
pub use entities::*;
pub use errors::*;
pub use permissions::{ANY_ROLE, NO_ROLE, OWNER, SENTINEL_PERMISSIONS};
