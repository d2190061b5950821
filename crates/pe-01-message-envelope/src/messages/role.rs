//! Role assignment credential, plain or group membership.

use super::{credential_issuer, document_hash, expect_documents, json_buffer, parse_json_buffer, MessageContent};
use crate::domain::{MessageAction, MessageType};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoleMessage {
    pub issuer: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub uuid: String,
    pub relationships: Vec<String>,
    pub hash: String,
    #[serde(skip)]
    pub document: Option<Value>,
}

impl RoleMessage {
    /// Body for a role credential.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be hashed.
    pub fn set_document(document: Value, role: impl Into<String>) -> Result<Self> {
        Ok(Self {
            issuer: credential_issuer(&document).unwrap_or_default(),
            role: role.into(),
            hash: document_hash(&document)?,
            document: Some(document),
            ..Self::default()
        })
    }

    /// Builder: group the role belongs to.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>, uuid: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self.uuid = uuid.into();
        self
    }
}

impl MessageContent for RoleMessage {
    const TYPES: &'static [MessageType] = &[MessageType::RoleDocument, MessageType::GuardianRole];
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
        json!({
            "issuer": self.issuer,
            "role": self.role,
            "group": self.group,
            "uuid": self.uuid,
            "relationships": self.relationships,
            "hash": self.hash,
        })
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.issuer)
    }

    fn relationships(&self) -> Vec<String> {
        self.relationships.clone()
    }

    fn validate(&self) -> bool {
        !self.issuer.is_empty() && !self.role.is_empty()
    }
}
