//! Verifiable presentation bundling credentials.

use super::{
    credential_issuer, document_hash, expect_documents, json_buffer, parse_json_buffer,
    MessageContent,
};
use crate::domain::{MessageAction, MessageType};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VpMessage {
    pub issuer: String,
    pub relationships: Vec<String>,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip)]
    pub document: Option<Value>,
}

impl VpMessage {
    /// Body for a presentation. The issuer falls back to the first proof's
    /// verification method controller when the VP has no `issuer`.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be hashed.
    pub fn set_document(document: Value) -> Result<Self> {
        let issuer = credential_issuer(&document)
            .or_else(|| {
                document
                    .pointer("/proof/verificationMethod")
                    .and_then(Value::as_str)
                    .map(|m| m.split('#').next().unwrap_or(m).to_string())
            })
            .unwrap_or_default();
        Ok(Self {
            issuer,
            hash: document_hash(&document)?,
            document: Some(document),
            ..Self::default()
        })
    }

    /// Builder: linked message ids.
    #[must_use]
    pub fn with_relationships(mut self, relationships: Vec<String>) -> Self {
        self.relationships = relationships;
        self
    }

    /// Builder: block tag that produced the VP.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl MessageContent for VpMessage {
    const TYPES: &'static [MessageType] = &[MessageType::VpDocument];
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
        !self.issuer.is_empty()
    }
}
