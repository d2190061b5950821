//! Token creation announcement. No off-ledger payload.

use super::MessageContent;
use crate::domain::MessageType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{TokenInfo, TokenType};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenMessage {
    pub token_id: String,
    pub token_name: String,
    pub token_symbol: String,
    pub token_type: String,
    pub decimals: u32,
    pub owner: String,
}

impl From<&TokenInfo> for TokenMessage {
    fn from(token: &TokenInfo) -> Self {
        let token_type = match token.token_type {
            TokenType::Fungible => "fungible",
            TokenType::NonFungible => "non-fungible",
        };
        Self {
            token_id: token.token_id.clone(),
            token_name: token.token_name.clone(),
            token_symbol: token.token_symbol.clone(),
            token_type: token_type.to_string(),
            decimals: token.decimals,
            owner: token.owner.clone().unwrap_or_default(),
        }
    }
}

impl MessageContent for TokenMessage {
    const TYPES: &'static [MessageType] = &[MessageType::Token];

    fn hash_object(&self) -> Value {
        json!({
            "tokenId": self.token_id,
            "tokenName": self.token_name,
            "tokenSymbol": self.token_symbol,
            "tokenType": self.token_type,
            "decimals": self.decimals,
            "owner": self.owner,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.owner)
    }

    fn validate(&self) -> bool {
        !self.token_id.is_empty()
    }
}
