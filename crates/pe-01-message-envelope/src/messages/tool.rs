//! Tool publication. Tools carry their own tags topic.

use super::{expect_documents, MessageContent};
use crate::domain::{MessageAction, MessageType};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolMessage {
    pub name: String,
    pub description: String,
    pub owner: String,
    pub uuid: String,
    /// Hash of the packaged tool.
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_topic_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags_topic_id: Option<String>,
    #[serde(skip)]
    pub document: Option<Vec<u8>>,
}

impl MessageContent for ToolMessage {
    const TYPES: &'static [MessageType] = &[MessageType::Tool];
    const URL_FIELDS: &'static [(&'static str, &'static str)] = &[("cid", "uri")];

    fn to_documents(&self, _: MessageType, _: MessageAction, _: Option<&str>) -> Result<Vec<Vec<u8>>> {
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
            "owner": self.owner,
            "uuid": self.uuid,
            "hash": self.hash,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.owner)
    }

    fn validate(&self) -> bool {
        !self.uuid.is_empty()
    }
}
