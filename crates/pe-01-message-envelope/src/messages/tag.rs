//! Tag attached to a published entity. Deletion republishes the tag with
//! `operation = "Delete"`.

use super::{expect_documents, json_buffer, parse_json_buffer, MessageContent};
use crate::domain::{MessageAction, MessageType};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagMessage {
    pub name: String,
    pub description: String,
    pub owner: String,
    pub uuid: String,
    /// Message id of the tagged entity.
    pub target: String,
    /// `Create` or `Delete`.
    pub operation: String,
    /// Tagged entity kind (`Schema`, `Policy`, ...).
    pub entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub document: Option<Value>,
}

impl MessageContent for TagMessage {
    const TYPES: &'static [MessageType] = &[MessageType::Tag];
    const URL_FIELDS: &'static [(&'static str, &'static str)] = &[("cid", "uri")];

    fn to_documents(&self, _: MessageType, action: MessageAction, _: Option<&str>) -> Result<Vec<Vec<u8>>> {
        if action == MessageAction::DeleteTag {
            return Ok(Vec::new());
        }
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
        json!({
            "name": self.name,
            "description": self.description,
            "owner": self.owner,
            "uuid": self.uuid,
            "target": self.target,
            "operation": self.operation,
            "entity": self.entity,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.owner)
    }

    fn validate(&self) -> bool {
        !self.uuid.is_empty() && !self.target.is_empty()
    }
}
