//! Topic creation announcement, published on the parent topic.

use super::MessageContent;
use crate::domain::MessageType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TopicMessage {
    pub name: String,
    pub description: String,
    pub owner: String,
    /// Kind of messages the topic carries (`USER_TOPIC`, `POLICY_TOPIC`, ...).
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl MessageContent for TopicMessage {
    const TYPES: &'static [MessageType] = &[MessageType::Topic];

    fn hash_object(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "owner": self.owner,
            "messageType": self.message_type,
            "childId": self.child_id,
            "parentId": self.parent_id,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.owner)
    }
}
