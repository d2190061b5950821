//! The ledger message: shared header, status payload and typed body.

use super::kinds::{MessageAction, MessageStatus, MessageType, UrlRef, UrlType};
use crate::error::{EnvelopeError, Result};
use crate::messages::MessageBody;
use serde_json::{json, Map, Value};
use shared_crypto::hash_json_base58;
use uuid::Uuid;

/// Language tag used when none is configured.
pub const DEFAULT_LANG: &str = "en-US";

const DELETE_REASON: &str = "Document Deleted";
const CHANGE_STATUS_REASON: &str = "Change Status";

/// Why a message was revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeReason {
    DocumentRevoked,
    ParentRevoked,
}

impl RevokeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocumentRevoked => "Document Revoked",
            Self::ParentRevoked => "Parent Revoked",
        }
    }
}

/// One ledger message.
///
/// `message_id` is a local correlation id minted at construction; `id` is
/// the consensus timestamp assigned by the ledger and stays `None` until
/// the submission is confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    message_id: String,
    pub id: Option<String>,
    pub topic_id: Option<String>,
    pub message_type: MessageType,
    action: MessageAction,
    status: MessageStatus,
    pub lang: String,
    pub account: Option<String>,
    pub payer: Option<String>,
    pub index: Option<u64>,
    pub transaction_memo: Option<String>,
    parent_ids: Option<Vec<String>>,
    status_message: Option<String>,
    status_reason: Option<String>,
    status_owner: Option<String>,
    urls: Vec<UrlRef>,
    body: MessageBody,
}

impl Message {
    /// Fresh `ISSUE` message under the body's default type.
    pub fn new(action: MessageAction, body: impl Into<MessageBody>) -> Self {
        let body = body.into();
        let message_type = body.types()[0];
        Self {
            message_id: Uuid::new_v4().to_string(),
            id: None,
            topic_id: None,
            message_type,
            action,
            status: MessageStatus::Issue,
            lang: DEFAULT_LANG.to_string(),
            account: None,
            payer: None,
            index: None,
            transaction_memo: None,
            parent_ids: None,
            status_message: None,
            status_reason: None,
            status_owner: None,
            urls: Vec::new(),
            body,
        }
    }

    /// Publish under another type the body accepts (`EVC-Document`,
    /// `Instance-Policy`, ...).
    ///
    /// # Errors
    ///
    /// `InvalidMessageType` when the body does not accept `ty`.
    pub fn with_type(mut self, ty: MessageType) -> Result<Self> {
        if !self.body.types().contains(&ty) {
            return Err(EnvelopeError::InvalidMessageType {
                expected: type_group(self.body.types()),
                actual: ty.as_str().to_string(),
            });
        }
        self.message_type = ty;
        Ok(self)
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn action(&self) -> MessageAction {
        self.action
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    pub fn parent_ids(&self) -> Option<&[String]> {
        self.parent_ids.as_deref()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn status_owner(&self) -> Option<&str> {
        self.status_owner.as_deref()
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut MessageBody {
        &mut self.body
    }

    pub fn owner(&self) -> Option<&str> {
        self.body.owner()
    }

    pub fn relationships(&self) -> Vec<String> {
        self.body.relationships()
    }

    pub fn is_revoked(&self) -> bool {
        self.status == MessageStatus::Revoke
    }

    /// Required body fields present. Status-only messages carry no body.
    pub fn validate(&self) -> bool {
        self.status != MessageStatus::Issue || self.body.validate()
    }

    // ===== Off-ledger references =====

    /// Replace document references, dropping entries without a cid.
    pub fn set_urls(&mut self, urls: Vec<UrlRef>) {
        self.urls = urls.into_iter().filter(|u| !u.cid.is_empty()).collect();
    }

    pub fn urls(&self) -> &[UrlRef] {
        &self.urls
    }

    /// One half of the `index`-th document reference.
    pub fn url_value(&self, index: usize, kind: UrlType) -> Option<&str> {
        self.urls.get(index).map(|u| u.get(kind))
    }

    /// Whether the `index`-th document reference is set.
    pub fn is_documents(&self, index: usize) -> bool {
        index < self.urls.len()
    }

    /// Off-ledger payloads in reference order.
    ///
    /// # Errors
    ///
    /// Missing documents, or an encrypted type without `key`.
    pub fn to_documents(&self, key: Option<&str>) -> Result<Vec<Vec<u8>>> {
        self.body.to_documents(self.message_type, self.action, key)
    }

    /// Hydrate the body from off-ledger payloads.
    ///
    /// # Errors
    ///
    /// Wrong buffer count, undecodable JSON, or a decryption failure.
    pub fn load_documents(&mut self, documents: &[Vec<u8>], key: Option<&str>) -> Result<()> {
        self.body.load_documents(self.message_type, documents, key)
    }

    // ===== Status transitions =====

    /// Mark revoked. `parent_ids` marks a cascade from a revoked parent.
    pub fn revoke(
        &mut self,
        message: impl Into<String>,
        owner: impl Into<String>,
        parent_ids: Option<Vec<String>>,
    ) {
        let reason = if parent_ids.is_some() {
            RevokeReason::ParentRevoked
        } else {
            RevokeReason::DocumentRevoked
        };
        self.status = MessageStatus::Revoke;
        self.status_message = Some(message.into());
        self.status_reason = Some(reason.as_str().to_string());
        self.status_owner = Some(owner.into());
        self.parent_ids = parent_ids;
        self.action = MessageAction::RevokeDocument;
    }

    pub fn delete(&mut self, message: impl Into<String>, parent_ids: Option<Vec<String>>) {
        self.status = MessageStatus::Deleted;
        self.status_message = Some(message.into());
        self.status_reason = Some(DELETE_REASON.to_string());
        self.parent_ids = parent_ids;
        self.action = MessageAction::DeleteDocument;
    }

    pub fn set_message_status(&mut self, status: MessageStatus, message: impl Into<String>) {
        self.status = status;
        self.status_message = Some(message.into());
        self.status_reason = Some(CHANGE_STATUS_REASON.to_string());
        self.action = MessageAction::ChangeMessageStatus;
    }

    /// Set the language, falling back to the default for empty input.
    pub fn set_lang(&mut self, lang: Option<&str>) {
        self.lang = match lang {
            Some(lang) if !lang.is_empty() => lang.to_string(),
            _ => DEFAULT_LANG.to_string(),
        };
    }

    // ===== Wire forms =====

    /// Flat wire object without `id` and `status`.
    ///
    /// # Errors
    ///
    /// Body serialization failure.
    pub fn to_message_object(&self) -> Result<Map<String, Value>> {
        let mut object = self.header_object();
        object.extend(self.body.write_fields()?);
        for (position, (cid_key, url_key)) in self.body.url_fields().iter().enumerate() {
            if let Some(url) = self.urls.get(position) {
                object.insert((*cid_key).to_string(), json!(url.cid));
                object.insert((*url_key).to_string(), json!(url.url));
            }
        }
        self.body.shape_object(self.action, &mut object);
        Ok(object)
    }

    /// Ledger payload. Exactly one status payload shape is serialized.
    ///
    /// # Errors
    ///
    /// Body serialization failure.
    pub fn to_message(&self) -> Result<String> {
        let object = match self.status {
            MessageStatus::Issue => {
                let mut object = self.to_message_object()?;
                object.insert("id".into(), json!(self.message_id));
                object.insert("status".into(), json!(self.status));
                self.body.shape_object(self.action, &mut object);
                object
            }
            MessageStatus::Revoke => {
                let mut object = self.status_header();
                object.insert("revokeMessage".into(), json!(self.status_message));
                insert_some(&mut object, "revokeOwner", self.status_owner.as_deref());
                object.insert("reason".into(), json!(self.status_reason));
                if let Some(parent_ids) = &self.parent_ids {
                    object.insert("parentIds".into(), json!(parent_ids));
                }
                object
            }
            MessageStatus::Deleted => {
                let mut object = self.status_header();
                object.insert("deleteMessage".into(), json!(self.status_message));
                object.insert("reason".into(), json!(self.status_reason));
                object
            }
            MessageStatus::Withdraw => {
                let mut object = self.status_header();
                object.insert("statusMessage".into(), json!(self.status_message));
                object.insert("reason".into(), json!(self.status_reason));
                object
            }
        };
        Ok(serde_json::to_string(&object)?)
    }

    /// base58(sha256(canonical JSON)) of the body's stable field subset.
    ///
    /// # Errors
    ///
    /// Canonicalization failure.
    pub fn to_hash(&self) -> Result<String> {
        let mut subject = match self.body.hash_object() {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("body".into(), other);
                map
            }
        };
        subject.insert("type".into(), json!(self.message_type));
        subject.insert("action".into(), json!(self.action));
        Ok(hash_json_base58(&subject)?)
    }

    /// Internal persistence form: header, references and body fields.
    ///
    /// # Errors
    ///
    /// Body serialization failure.
    pub fn to_json(&self) -> Result<Value> {
        Ok(json!({
            "id": self.id,
            "messageId": self.message_id,
            "topicId": self.topic_id,
            "lang": self.lang,
            "account": self.account,
            "type": self.message_type,
            "payer": self.payer,
            "index": self.index,
            "status": self.status,
            "parentIds": self.parent_ids,
            "statusMessage": self.status_message,
            "statusReason": self.status_reason,
            "statusOwner": self.status_owner,
            "action": self.action,
            "transactionMemo": self.transaction_memo,
            "urls": self.urls,
            "body": Value::Object(self.body.write_fields()?),
        }))
    }

    /// Inverse of [`Message::to_json`].
    ///
    /// # Errors
    ///
    /// Unknown discriminators or undecodable fields.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or(EnvelopeError::EmptyObject)?;
        let message_type = read_type(object)?;
        let body_fields = object
            .get("body")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let body = MessageBody::read(message_type, &body_fields)?;
        let urls: Vec<UrlRef> = match object.get("urls") {
            Some(Value::Array(_)) => serde_json::from_value(object["urls"].clone())?,
            _ => Vec::new(),
        };
        Ok(Self {
            message_id: str_field(object, "messageId").unwrap_or_default(),
            id: str_field(object, "id"),
            topic_id: str_field(object, "topicId"),
            message_type,
            action: read_action(object)?,
            status: read_status(object)?,
            lang: str_field(object, "lang").unwrap_or_else(|| DEFAULT_LANG.to_string()),
            account: str_field(object, "account"),
            payer: str_field(object, "payer"),
            index: object.get("index").and_then(Value::as_u64),
            transaction_memo: str_field(object, "transactionMemo"),
            parent_ids: read_parent_ids(object),
            status_message: str_field(object, "statusMessage"),
            status_reason: str_field(object, "statusReason"),
            status_owner: str_field(object, "statusOwner"),
            urls,
            body,
        })
    }

    /// Parse a ledger wire object whose type is already known.
    pub(crate) fn read_object(message_type: MessageType, object: &Map<String, Value>) -> Result<Self> {
        let body = MessageBody::read(message_type, object)?;
        let status = read_status(object)?;
        let mut message = Self::new(read_action(object)?, body);
        message.message_type = message_type;
        message.status = status;
        message.message_id = str_field(object, "id").unwrap_or_default();
        message.lang = str_field(object, "lang").unwrap_or_else(|| DEFAULT_LANG.to_string());
        message.account = str_field(object, "account");

        match status {
            MessageStatus::Issue => {
                let urls = message
                    .body
                    .url_fields()
                    .iter()
                    .map(|(cid_key, url_key)| {
                        UrlRef::new(
                            str_field(object, cid_key).unwrap_or_default(),
                            str_field(object, url_key).unwrap_or_default(),
                        )
                    })
                    .collect();
                message.set_urls(urls);
            }
            MessageStatus::Revoke => {
                message.status_message = str_field(object, "revokeMessage");
                message.status_reason = str_field(object, "reason");
                message.status_owner = str_field(object, "revokeOwner");
                message.parent_ids = read_parent_ids(object);
            }
            MessageStatus::Deleted => {
                message.status_message = str_field(object, "deleteMessage");
                message.status_reason = str_field(object, "reason");
            }
            MessageStatus::Withdraw => {
                message.status_message = str_field(object, "statusMessage");
                message.status_reason = str_field(object, "reason");
            }
        }
        Ok(message)
    }

    fn header_object(&self) -> Map<String, Value> {
        let mut object = Map::new();
        object.insert("type".into(), json!(self.message_type));
        object.insert("action".into(), json!(self.action));
        object.insert("lang".into(), json!(self.lang));
        insert_some(&mut object, "account", self.account.as_deref());
        object
    }

    fn status_header(&self) -> Map<String, Value> {
        let mut object = Map::new();
        object.insert("id".into(), json!(self.message_id));
        object.insert("status".into(), json!(self.status));
        object.extend(self.header_object());
        object
    }
}

fn insert_some(object: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        object.insert(key.to_string(), json!(value));
    }
}

fn str_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn read_parent_ids(object: &Map<String, Value>) -> Option<Vec<String>> {
    object.get("parentIds").and_then(Value::as_array).map(|ids| {
        ids.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

pub(crate) fn read_type(object: &Map<String, Value>) -> Result<MessageType> {
    let raw = object.get("type").and_then(Value::as_str).unwrap_or("UNKNOWN TYPE");
    MessageType::parse(raw).ok_or_else(|| EnvelopeError::InvalidFormat(raw.to_string()))
}

fn read_action(object: &Map<String, Value>) -> Result<MessageAction> {
    let raw = object.get("action").and_then(Value::as_str).unwrap_or_default();
    MessageAction::parse(raw).ok_or_else(|| EnvelopeError::InvalidAction(raw.to_string()))
}

fn read_status(object: &Map<String, Value>) -> Result<MessageStatus> {
    match object.get("status").and_then(Value::as_str) {
        None => Ok(MessageStatus::Issue),
        Some(raw) => MessageStatus::parse(raw).ok_or(EnvelopeError::InvalidJson),
    }
}

pub(crate) fn type_group(types: &[MessageType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{DidMessage, PolicyMessage, VcMessage};

    fn vc_message() -> Message {
        let body = VcMessage::set_document(json!({
            "id": "urn:uuid:42",
            "issuer": { "id": "did:hedera:issuer" },
            "credentialSubject": [{ "field0": 7 }]
        }))
        .unwrap()
        .with_relationships(vec!["1700000000.000000001".into()]);
        Message::new(MessageAction::CreateVc, body)
    }

    fn parse(text: &str) -> Map<String, Value> {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_new_message_defaults() {
        let message = vc_message();
        assert_eq!(message.message_type, MessageType::VcDocument);
        assert_eq!(message.status(), MessageStatus::Issue);
        assert_eq!(message.lang, DEFAULT_LANG);
        assert!(message.id.is_none());
        assert!(!message.message_id().is_empty());
    }

    #[test]
    fn test_with_type_rejects_foreign_type() {
        let err = vc_message().with_type(MessageType::Policy).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidMessageType { .. }));
        let evc = vc_message().with_type(MessageType::EvcDocument).unwrap();
        assert_eq!(evc.message_type, MessageType::EvcDocument);
    }

    #[test]
    fn test_set_urls_filters_empty_cid() {
        let mut message = vc_message();
        message.set_urls(vec![UrlRef::new("", "x"), UrlRef::new("bafy1", "ipfs://bafy1")]);
        assert_eq!(message.urls().len(), 1);
        assert_eq!(message.url_value(0, UrlType::Cid), Some("bafy1"));
        assert!(message.is_documents(0));
        assert!(!message.is_documents(1));
    }

    #[test]
    fn test_issue_payload_carries_body_and_urls() {
        let mut message = vc_message();
        message.set_urls(vec![UrlRef::new("bafy1", "ipfs://bafy1")]);
        let object = parse(&message.to_message().unwrap());

        assert_eq!(object["status"], json!("ISSUE"));
        assert_eq!(object["id"], json!(message.message_id()));
        assert_eq!(object["type"], json!("VC-Document"));
        assert_eq!(object["issuer"], json!("did:hedera:issuer"));
        assert_eq!(object["cid"], json!("bafy1"));
        assert_eq!(object["uri"], json!("ipfs://bafy1"));
        assert!(!object.contains_key("revokeMessage"));
    }

    #[test]
    fn test_revoke_payload_is_exclusive() {
        let mut message = vc_message();
        message.revoke("bad data", "did:hedera:owner", Some(vec!["p1".into()]));
        let object = parse(&message.to_message().unwrap());

        assert_eq!(object["status"], json!("REVOKE"));
        assert_eq!(object["action"], json!("revoke-document"));
        assert_eq!(object["reason"], json!("Parent Revoked"));
        assert_eq!(object["revokeOwner"], json!("did:hedera:owner"));
        assert_eq!(object["parentIds"], json!(["p1"]));
        assert!(!object.contains_key("issuer"));
        assert!(!object.contains_key("deleteMessage"));
        assert!(!object.contains_key("statusMessage"));
    }

    #[test]
    fn test_revoke_without_parents() {
        let mut message = vc_message();
        message.revoke("bad", "did:o", None);
        assert_eq!(message.status_reason(), Some("Document Revoked"));
        assert!(message.is_revoked());
    }

    #[test]
    fn test_delete_and_status_change_payloads() {
        let mut deleted = vc_message();
        deleted.delete("gone", None);
        let object = parse(&deleted.to_message().unwrap());
        assert_eq!(object["deleteMessage"], json!("gone"));
        assert_eq!(object["reason"], json!("Document Deleted"));
        assert!(!object.contains_key("revokeMessage"));

        let mut withdrawn = vc_message();
        withdrawn.set_message_status(MessageStatus::Withdraw, "withdrawn");
        let object = parse(&withdrawn.to_message().unwrap());
        assert_eq!(object["statusMessage"], json!("withdrawn"));
        assert_eq!(object["reason"], json!("Change Status"));
        assert_eq!(object["action"], json!("change-message-status"));
    }

    #[test]
    fn test_hash_ignores_urls() {
        let message = vc_message();
        let mut with_urls = message.clone();
        with_urls.set_urls(vec![UrlRef::new("bafy", "ipfs://bafy")]);
        assert_eq!(message.to_hash().unwrap(), with_urls.to_hash().unwrap());

        let other = Message::new(MessageAction::CreateDid, DidMessage::set_document(json!({"id": "did:x"})));
        assert_ne!(message.to_hash().unwrap(), other.to_hash().unwrap());
    }

    #[test]
    fn test_json_persistence_roundtrip() {
        let mut message = Message::new(
            MessageAction::PublishPolicy,
            PolicyMessage {
                name: "Policy".into(),
                owner: "did:hedera:sr".into(),
                uuid: "u-1".into(),
                ..PolicyMessage::default()
            },
        );
        message.id = Some("1700000000.000000002".into());
        message.topic_id = Some("0.0.77".into());
        message.index = Some(3);
        message.set_urls(vec![UrlRef::new("bafy", "ipfs://bafy")]);

        let restored = Message::from_json(&message.to_json().unwrap()).unwrap();
        assert_eq!(restored, message);
    }

    #[test]
    fn test_set_lang_falls_back() {
        let mut message = vc_message();
        message.set_lang(Some("fr-FR"));
        assert_eq!(message.lang, "fr-FR");
        message.set_lang(Some(""));
        assert_eq!(message.lang, DEFAULT_LANG);
    }
}
