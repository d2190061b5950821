//! # Policy Configuration Model
//!
//! The persisted, editor-authored form of a policy: a tree of
//! [`BlockConfig`] nodes, each with its own event wiring.
//!
//! Block-type specific options are not modelled here; they are kept as the
//! flattened remainder of the JSON object and read by the block that owns
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Event names used on both ends of a link.
///
/// Input and output events share one namespace. Names outside the fixed set
/// are carried as [`PolicyEventType::Custom`] (switch conditions emit their
/// condition tag, for instance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PolicyEventType {
    /// Forward documents to the next block.
    RunEvent,
    /// Ask a block to re-render for its users.
    RefreshEvent,
    /// Release the enclosing step container.
    ReleaseEvent,
    /// Emitted when a handler fails.
    ErrorEvent,
    /// Periodic tick from a timer block.
    TimerEvent,
    /// Remove a buffered document.
    PopEvent,
    /// Put a document back into a buffer.
    RestoreEvent,
    /// Arm a timer for the acting user.
    StartTimerEvent,
    /// Disarm a timer for the acting user.
    StopTimerEvent,
    /// Any other event name.
    Custom(String),
}

impl PolicyEventType {
    /// Wire name of the event.
    pub fn as_str(&self) -> &str {
        match self {
            Self::RunEvent => "RunEvent",
            Self::RefreshEvent => "RefreshEvent",
            Self::ReleaseEvent => "ReleaseEvent",
            Self::ErrorEvent => "ErrorEvent",
            Self::TimerEvent => "TimerEvent",
            Self::PopEvent => "PopEvent",
            Self::RestoreEvent => "RestoreEvent",
            Self::StartTimerEvent => "StartTimerEvent",
            Self::StopTimerEvent => "StopTimerEvent",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for PolicyEventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "RunEvent" => Self::RunEvent,
            "RefreshEvent" => Self::RefreshEvent,
            "ReleaseEvent" => Self::ReleaseEvent,
            "ErrorEvent" => Self::ErrorEvent,
            "TimerEvent" => Self::TimerEvent,
            "PopEvent" => Self::PopEvent,
            "RestoreEvent" => Self::RestoreEvent,
            "StartTimerEvent" => Self::StartTimerEvent,
            "StopTimerEvent" => Self::StopTimerEvent,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for PolicyEventType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<PolicyEventType> for String {
    fn from(value: PolicyEventType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PolicyEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whose identity the target block sees when a link fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventActor {
    /// The user who triggered the source block.
    #[default]
    #[serde(rename = "")]
    EventInitiator,
    /// The owner of the document carried by the event.
    #[serde(rename = "owner")]
    Owner,
    /// The issuer of the document carried by the event.
    #[serde(rename = "issuer")]
    Issuer,
}

/// A configured link between two blocks, addressed by tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Tag of the emitting block.
    pub source: String,
    /// Tag of the receiving block.
    pub target: String,
    /// Event the source emits.
    pub output: PolicyEventType,
    /// Handler invoked on the target.
    pub input: PolicyEventType,
    /// Identity passed to the target.
    #[serde(default)]
    pub actor: EventActor,
    /// Disabled links are never registered.
    #[serde(default)]
    pub disabled: bool,
}

/// One node of the persisted block tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BlockConfig {
    /// Stable block id; missing ids are reported by validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Selects the behavior registered for this node.
    pub block_type: String,
    /// Policy-unique name used by links and UI lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Role names allowed to see the block.
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub default_active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BlockConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventConfig>,
    /// Block-type specific options.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl BlockConfig {
    /// Create a bare config node.
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            ..Self::default()
        }
    }

    /// Builder: set the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder: set the tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Builder: set permissions.
    #[must_use]
    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permissions = permissions.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Builder: set `defaultActive`.
    #[must_use]
    pub fn active(mut self, default_active: bool) -> Self {
        self.default_active = default_active;
        self
    }

    /// Builder: set one option.
    #[must_use]
    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    /// Builder: append a child.
    #[must_use]
    pub fn with_child(mut self, child: BlockConfig) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: append a link.
    #[must_use]
    pub fn with_event(mut self, event: EventConfig) -> Self {
        self.events.push(event);
        self
    }

    /// Option lookup.
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// String option lookup (empty strings count as absent).
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Boolean option lookup, `false` when absent.
    pub fn option_bool(&self, key: &str) -> bool {
        self.options
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Visit this node and all descendants in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a BlockConfig)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Publication state of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStatus {
    #[default]
    Draft,
    DryRun,
    Publish,
    Discontinued,
}

/// A persisted policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// DID of the policy owner (standard registry).
    pub owner: String,
    /// Roles declared by the policy, in addition to the sentinels.
    #[serde(default)]
    pub policy_roles: Vec<String>,
    /// Root topic for messages without a more specific topic.
    #[serde(default)]
    pub instance_topic_id: Option<String>,
    #[serde(default)]
    pub status: PolicyStatus,
    #[serde(default)]
    pub discontinued_date: Option<DateTime<Utc>>,
    /// Root of the block tree.
    pub config: BlockConfig,
}

impl PolicyConfig {
    /// A policy stops accepting actions once discontinued, either explicitly
    /// or because its discontinuation date has passed.
    pub fn is_discontinued(&self, now: DateTime<Utc>) -> bool {
        self.status == PolicyStatus::Discontinued
            || self.discontinued_date.is_some_and(|date| date <= now)
    }

    /// Whether the policy runs against the virtual ledger.
    pub fn is_dry_run(&self) -> bool {
        self.status == PolicyStatus::DryRun
    }
}
