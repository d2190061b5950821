//! DID document announcement.

use super::{expect_documents, json_buffer, parse_json_buffer, MessageContent};
use crate::domain::{MessageAction, MessageType};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DidMessage {
    pub did: String,
    /// DID document, stored off-ledger.
    #[serde(skip)]
    pub document: Option<Value>,
}

impl DidMessage {
    /// Body for a DID document; the DID is read from its `id`.
    pub fn set_document(document: Value) -> Self {
        let did = document
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            did,
            document: Some(document),
        }
    }
}

impl MessageContent for DidMessage {
    const TYPES: &'static [MessageType] = &[MessageType::DidDocument];
    const URL_FIELDS: &'static [(&'static str, &'static str)] = &[("cid", "uri")];

    fn to_documents(&self, _: MessageType, _: MessageAction, _: Option<&str>) -> Result<Vec<Vec<u8>>> {
        match &self.document {
            Some(document) => Ok(vec![json_buffer(document)?]),
            None => Ok(Vec::new()),
        }
    }

    fn load_documents(&mut self, _: MessageType, documents: &[Vec<u8>], _: Option<&str>) -> Result<()> {
        expect_documents(documents, 1)?;
        self.document = Some(parse_json_buffer(&documents[0])?);
        Ok(())
    }

    fn hash_object(&self) -> Value {
        json!({ "did": self.did })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.did)
    }

    fn validate(&self) -> bool {
        !self.did.is_empty()
    }
}
