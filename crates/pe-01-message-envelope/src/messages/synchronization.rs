//! Multi-policy synchronization event.
//!
//! Mint events describe the tokens issued; every other action links the
//! message that triggered the synchronization.

use super::MessageContent;
use crate::domain::{MessageAction, MessageType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const MINT_FIELDS: [&str; 4] = ["tokenId", "amount", "memo", "target"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynchronizationMessage {
    pub user: String,
    pub policy: String,
    pub policy_type: String,
    pub policy_owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl MessageContent for SynchronizationMessage {
    const TYPES: &'static [MessageType] = &[MessageType::Synchronization];

    fn shape_object(&self, action: MessageAction, object: &mut Map<String, Value>) {
        if action == MessageAction::Mint {
            object.remove("messageId");
        } else {
            for field in MINT_FIELDS {
                object.remove(field);
            }
        }
    }

    fn hash_object(&self) -> Value {
        json!({
            "user": self.user,
            "policy": self.policy,
            "policyType": self.policy_type,
            "policyOwner": self.policy_owner,
            "messageId": self.message_id,
            "tokenId": self.token_id,
            "amount": self.amount,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.policy_owner)
    }

    fn validate(&self) -> bool {
        !self.policy.is_empty()
    }
}
