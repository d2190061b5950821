//! Policy publication.
//!
//! Ledger messages have a hard size limit. When the wire object grows past
//! [`POLICY_MESSAGE_MAX_SIZE`] bytes, free-text fields are shortened in a
//! fixed order until it fits. The order and limits are part of the wire
//! format and must not change.

use super::{expect_documents, MessageContent};
use crate::domain::{MessageAction, MessageType};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Serialized size budget of a policy message, in bytes.
pub const POLICY_MESSAGE_MAX_SIZE: usize = 950;

/// Truncated fields never drop below this many characters.
pub const TRUNCATED_FIELD_MIN_LEN: usize = 40;

const ELLIPSIS: &str = "...";

/// Fields shortened to meet the size budget, in order.
const TRUNCATION_ORDER: [&str; 4] = ["topicDescription", "description", "name", "policyTag"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyMessage {
    pub name: String,
    pub description: String,
    pub topic_description: String,
    pub policy_tag: String,
    pub owner: String,
    pub uuid: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_topic_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_topic_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synchronization_topic_id: Option<String>,
    /// Only carried by discontinue actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<DateTime<Utc>>,
    /// Packaged policy, stored off-ledger.
    #[serde(skip)]
    pub document: Option<Vec<u8>>,
}

impl MessageContent for PolicyMessage {
    const TYPES: &'static [MessageType] = &[MessageType::Policy, MessageType::InstancePolicy];
    const URL_FIELDS: &'static [(&'static str, &'static str)] = &[("cid", "uri")];

    fn shape_object(&self, action: MessageAction, object: &mut Map<String, Value>) {
        if !matches!(
            action,
            MessageAction::DiscontinuePolicy | MessageAction::DeferredDiscontinuePolicy
        ) {
            object.remove("effectiveDate");
        }
        limit_size(object);
    }

    fn to_documents(&self, _: MessageType, action: MessageAction, _: Option<&str>) -> Result<Vec<Vec<u8>>> {
        if matches!(
            action,
            MessageAction::DiscontinuePolicy
                | MessageAction::DeferredDiscontinuePolicy
                | MessageAction::DeletePolicy
        ) {
            return Ok(Vec::new());
        }
        Ok(self.document.iter().cloned().collect())
    }

    fn load_documents(&mut self, _: MessageType, documents: &[Vec<u8>], _: Option<&str>) -> Result<()> {
        expect_documents(documents, 1)?;
        self.document = Some(documents[0].clone());
        Ok(())
    }

    fn hash_object(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "topicDescription": self.topic_description,
            "policyTag": self.policy_tag,
            "owner": self.owner,
            "uuid": self.uuid,
            "version": self.version,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.owner)
    }

    fn validate(&self) -> bool {
        !self.owner.is_empty()
    }
}

fn serialized_len(object: &Map<String, Value>) -> usize {
    serde_json::to_string(object).map(|s| s.len()).unwrap_or(0)
}

/// Shorten free-text fields until the object fits the budget.
fn limit_size(object: &mut Map<String, Value>) {
    for key in TRUNCATION_ORDER {
        loop {
            let size = serialized_len(object);
            if size <= POLICY_MESSAGE_MAX_SIZE {
                return;
            }
            let Some(text) = object.get(key).and_then(Value::as_str) else {
                break;
            };
            if text.chars().count() <= TRUNCATED_FIELD_MIN_LEN {
                break;
            }
            let truncated = truncate(text, size - POLICY_MESSAGE_MAX_SIZE);
            object.insert(key.to_string(), Value::String(truncated));
        }
    }
}

/// Drop `excess` bytes from `text`, ellipsis included, cutting on a char
/// boundary and keeping at least [`TRUNCATED_FIELD_MIN_LEN`] characters.
fn truncate(text: &str, excess: usize) -> String {
    let floor = text
        .char_indices()
        .nth(TRUNCATED_FIELD_MIN_LEN - ELLIPSIS.len())
        .map_or(text.len(), |(index, _)| index);
    let mut end = text.len().saturating_sub(excess + ELLIPSIS.len()).max(floor);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{ELLIPSIS}", &text[..end])
}
