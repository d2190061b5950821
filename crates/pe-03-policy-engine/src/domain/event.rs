//! Events travelling along links between blocks.

use serde_json::Value;
use shared_types::{EventActor, PolicyDocument, PolicyEventType, PolicyUser};

/// Payload carried by an event.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventData {
    #[default]
    Empty,
    /// One document.
    Document(PolicyDocument),
    /// A batch of documents.
    Documents(Vec<PolicyDocument>),
    /// DIDs of users, sent by timers.
    Users(Vec<String>),
}

impl EventData {
    /// All documents in the payload, in order.
    pub fn documents(&self) -> Vec<&PolicyDocument> {
        match self {
            Self::Document(doc) => vec![doc],
            Self::Documents(docs) => docs.iter().collect(),
            Self::Empty | Self::Users(_) => Vec::new(),
        }
    }

    /// Owned documents in the payload, in order.
    pub fn into_documents(self) -> Vec<PolicyDocument> {
        match self {
            Self::Document(doc) => vec![doc],
            Self::Documents(docs) => docs,
            Self::Empty | Self::Users(_) => Vec::new(),
        }
    }

    /// The single document, or the first of a batch.
    pub fn first_document(&self) -> Option<&PolicyDocument> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Documents(docs) => docs.first(),
            Self::Empty | Self::Users(_) => None,
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Documents(_))
    }

    /// User DIDs carried by a timer tick.
    pub fn users(&self) -> &[String] {
        match self {
            Self::Users(users) => users,
            _ => &[],
        }
    }
}

/// What a block hands to `trigger`: the payload plus an optional result
/// document (a mint block forwards its presentation this way).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventState {
    pub data: EventData,
    pub result: Option<PolicyDocument>,
}

impl EventState {
    #[must_use]
    pub fn with_result(mut self, result: PolicyDocument) -> Self {
        self.result = Some(result);
        self
    }
}

impl From<EventData> for EventState {
    fn from(data: EventData) -> Self {
        Self { data, result: None }
    }
}

impl From<PolicyDocument> for EventState {
    fn from(doc: PolicyDocument) -> Self {
        EventData::Document(doc).into()
    }
}

impl From<Vec<PolicyDocument>> for EventState {
    fn from(docs: Vec<PolicyDocument>) -> Self {
        EventData::Documents(docs).into()
    }
}

/// An event delivered to a target block.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyEvent {
    /// Handler invoked on the target.
    pub input: PolicyEventType,
    /// Event emitted by the source.
    pub output: PolicyEventType,
    pub policy_id: String,
    /// Source block id.
    pub source: String,
    /// Target block id.
    pub target: String,
    /// Effective actor after link resolution.
    pub user: PolicyUser,
    pub data: EventData,
    pub result: Option<PolicyDocument>,
}

impl PolicyEvent {
    /// Raw payload as JSON, for blocks that inspect documents generically.
    pub fn documents_json(&self) -> Vec<Value> {
        self.data
            .documents()
            .into_iter()
            .map(|doc| doc.document.clone())
            .collect()
    }
}

/// A registered link. Links are held by their source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLink {
    pub output: PolicyEventType,
    pub input: PolicyEventType,
    /// Arena index of the source block.
    pub source: usize,
    /// Arena index of the target block.
    pub target: usize,
    pub actor: EventActor,
}

/// A link a behavior asks for on top of the configured ones, addressed by
/// target tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitLink {
    pub output: PolicyEventType,
    pub input: PolicyEventType,
    pub target_tag: String,
    pub actor: EventActor,
}
