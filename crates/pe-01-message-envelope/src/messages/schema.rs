//! Schema publication. Carries two off-ledger documents: the JSON schema and
//! its JSON-LD context.

use super::{expect_documents, json_buffer, parse_json_buffer, MessageContent};
use crate::domain::{MessageAction, MessageType};
use crate::error::{EnvelopeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaMessage {
    pub name: String,
    pub description: String,
    pub entity: String,
    pub owner: String,
    pub uuid: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_version: Option<String>,
    pub relationships: Vec<String>,
    #[serde(skip)]
    pub document: Option<Value>,
    #[serde(skip)]
    pub context: Option<Value>,
}

impl MessageContent for SchemaMessage {
    const TYPES: &'static [MessageType] = &[MessageType::Schema, MessageType::SchemaPackage];
    const URL_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("document_cid", "document_uri"),
        ("context_cid", "context_uri"),
    ];

    fn to_documents(&self, _: MessageType, action: MessageAction, _: Option<&str>) -> Result<Vec<Vec<u8>>> {
        if action == MessageAction::DeleteSchema {
            return Ok(Vec::new());
        }
        let document = self
            .document
            .as_ref()
            .ok_or(EnvelopeError::MissingDocument("schema document"))?;
        let context = self
            .context
            .as_ref()
            .ok_or(EnvelopeError::MissingDocument("schema context"))?;
        Ok(vec![json_buffer(document)?, json_buffer(context)?])
    }

    fn load_documents(&mut self, _: MessageType, documents: &[Vec<u8>], _: Option<&str>) -> Result<()> {
        expect_documents(documents, 2)?;
        self.document = Some(parse_json_buffer(&documents[0])?);
        self.context = Some(parse_json_buffer(&documents[1])?);
        Ok(())
    }

    fn hash_object(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "entity": self.entity,
            "owner": self.owner,
            "uuid": self.uuid,
            "version": self.version,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.owner)
    }

    fn relationships(&self) -> Vec<String> {
        self.relationships.clone()
    }

    fn validate(&self) -> bool {
        !self.owner.is_empty() && !self.uuid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_schema_has_no_documents() {
        let body = SchemaMessage::default();
        let docs = body
            .to_documents(MessageType::Schema, MessageAction::DeleteSchema, None)
            .unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_publish_requires_both_documents() {
        let body = SchemaMessage {
            document: Some(json!({"type": "object"})),
            ..SchemaMessage::default()
        };
        let err = body
            .to_documents(MessageType::Schema, MessageAction::PublishSchema, None)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingDocument(_)));
    }
}
