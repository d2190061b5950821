//! Smart contract registration.

use super::MessageContent;
use crate::domain::MessageType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractMessage {
    pub contract_id: String,
    pub description: String,
    pub contract_type: String,
    pub owner: String,
}

impl MessageContent for ContractMessage {
    const TYPES: &'static [MessageType] = &[MessageType::Contract];

    fn hash_object(&self) -> Value {
        json!({
            "contractId": self.contract_id,
            "description": self.description,
            "contractType": self.contract_type,
            "owner": self.owner,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.owner)
    }

    fn validate(&self) -> bool {
        !self.contract_id.is_empty()
    }
}
