//! Standard registry registration.

use super::MessageContent;
use crate::domain::MessageType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistrationMessage {
    pub did: String,
    /// Root topic of the registry.
    pub topic_id: String,
    /// Free-form registry profile.
    pub attributes: Map<String, Value>,
}

impl MessageContent for RegistrationMessage {
    const TYPES: &'static [MessageType] = &[MessageType::StandardRegistry];

    fn hash_object(&self) -> Value {
        json!({
            "did": self.did,
            "topicId": self.topic_id,
            "attributes": self.attributes,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.did)
    }

    fn validate(&self) -> bool {
        !self.did.is_empty()
    }
}
