//! Verifiable credential, plain or encrypted.
//!
//! `EVC-Document` bodies always encrypt their off-ledger document; a missing
//! key is a hard failure in both directions.

use super::{
    credential_issuer, document_hash, expect_documents, json_buffer, parse_json_buffer,
    MessageContent,
};
use crate::domain::{MessageAction, MessageType};
use crate::error::{EnvelopeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_crypto::{decrypt, encrypt, SecretKey};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VcMessage {
    pub issuer: String,
    pub relationships: Vec<String>,
    /// Set for encrypted payloads.
    pub encoded_data: bool,
    /// Workflow status of the credential (`NEW`, `Approved`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_status: Option<String>,
    /// Hash of the credential document.
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip)]
    pub document: Option<Value>,
}

impl VcMessage {
    /// Body for an issued credential.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be hashed.
    pub fn set_document(document: Value) -> Result<Self> {
        Ok(Self {
            issuer: credential_issuer(&document).unwrap_or_default(),
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

    /// Builder: document status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.document_status = Some(status.into());
        self
    }

    /// Builder: mark the payload as encrypted.
    #[must_use]
    pub fn encrypted(mut self) -> Self {
        self.encoded_data = true;
        self
    }

    fn needs_encryption(&self, ty: MessageType) -> bool {
        ty == MessageType::EvcDocument || self.encoded_data
    }
}

impl MessageContent for VcMessage {
    const TYPES: &'static [MessageType] = &[MessageType::VcDocument, MessageType::EvcDocument];
    const URL_FIELDS: &'static [(&'static str, &'static str)] = &[("cid", "uri")];

    fn to_documents(&self, ty: MessageType, _: MessageAction, key: Option<&str>) -> Result<Vec<Vec<u8>>> {
        let Some(document) = &self.document else {
            return Ok(Vec::new());
        };
        let buffer = json_buffer(document)?;
        if !self.needs_encryption(ty) {
            return Ok(vec![buffer]);
        }
        let key = key.ok_or(EnvelopeError::EncryptionKeyRequired)?;
        Ok(vec![encrypt(&SecretKey::derive(key)?, &buffer)?])
    }

    fn load_documents(&mut self, ty: MessageType, documents: &[Vec<u8>], key: Option<&str>) -> Result<()> {
        expect_documents(documents, 1)?;
        let buffer = if self.needs_encryption(ty) {
            let key = key.ok_or(EnvelopeError::EncryptionKeyRequired)?;
            decrypt(&SecretKey::derive(key)?, &documents[0])?
        } else {
            documents[0].clone()
        };
        self.document = Some(parse_json_buffer(&buffer)?);
        Ok(())
    }

    fn hash_object(&self) -> Value {
        json!({
            "issuer": self.issuer,
            "relationships": self.relationships,
            "hash": self.hash,
            "documentStatus": self.document_status,
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
