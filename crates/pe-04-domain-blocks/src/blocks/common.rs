//! Helpers shared by the action blocks: option parsing, ledger publishing
//! and document bookkeeping.

use pe_01_message_envelope::{Message, MessageAction, VcMessage, VpMessage};
use pe_02_message_transport::SendOptions;
use pe_03_policy_engine::{BlockContext, BlockResult};
use serde_json::{Map, Value};
use shared_types::{PolicyDocument, PolicyUser};
use std::fmt::Display;

/// Attribute any error to the block that hit it.
pub(crate) trait OrBlockError<T> {
    fn or_block(self, ctx: &BlockContext<'_>) -> BlockResult<T>;
}

impl<T, E: Display> OrBlockError<T> for Result<T, E> {
    fn or_block(self, ctx: &BlockContext<'_>) -> BlockResult<T> {
        self.map_err(|err| ctx.error(err.to_string()))
    }
}

// ===== Options =====

/// A number given either as a JSON number or a numeric string.
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn option_f64(options: &Map<String, Value>, key: &str) -> Option<f64> {
    options.get(key).and_then(as_f64)
}

/// Non-empty string option.
pub(crate) fn option_str<'a>(options: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    options
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn option_bool(options: &Map<String, Value>, key: &str) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Array option, empty when absent.
pub(crate) fn option_array<'a>(options: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    options
        .get(key)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

// ===== JSON paths =====

/// Read a dotted path; numeric segments index arrays.
pub(crate) fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(segment),
    })
}

/// Write a dotted path, creating missing object members. Numeric segments
/// address existing array items. Returns false when the path is blocked.
pub(crate) fn set_path(target: &mut Value, path: &str, value: Value) -> bool {
    let mut current = target;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(item) => item,
                None => return false,
            },
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            _ => return false,
        };
        if segments.peek().is_none() {
            *current = value;
            return true;
        }
    }
    false
}

/// A float as a JSON number, integral values without a fraction.
pub(crate) fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

// ===== Ledger =====

/// Message ids, topics and accounts of an input batch.
#[derive(Debug, Default)]
pub(crate) struct BatchRefs {
    pub messages: Vec<String>,
    pub topics: Vec<String>,
    pub accounts: Vec<String>,
}

impl BatchRefs {
    /// Collect references, rejecting documents whose proof failed.
    pub fn collect(
        ctx: &BlockContext<'_>,
        docs: &[PolicyDocument],
        account_field: &str,
    ) -> BlockResult<Self> {
        let mut refs = Self::default();
        for doc in docs {
            if doc.signature == shared_types::DocumentSignature::Invalid {
                return Err(ctx.error("Invalid VC proof"));
            }
            refs.messages.extend(doc.message_id.clone());
            refs.topics.extend(doc.topic_id.clone());
            refs.accounts.extend(doc.accounts.get(account_field).cloned());
        }
        Ok(refs)
    }
}

/// The first document's topic, else the policy's instance topic.
pub(crate) fn resolve_topic(ctx: &BlockContext<'_>, topics: &[String]) -> BlockResult<String> {
    topics
        .first()
        .cloned()
        .or_else(|| ctx.policy().instance_topic_id.clone())
        .ok_or_else(|| ctx.error("Topic is not set"))
}

/// A sent message's consensus id.
pub(crate) fn message_id(message: &Message) -> String {
    message
        .id
        .clone()
        .unwrap_or_else(|| message.message_id().to_string())
}

/// Submit a credential and return the sent message.
pub(crate) async fn send_vc(
    ctx: &BlockContext<'_>,
    vc: &Value,
    relationships: &[String],
    topic: &str,
) -> BlockResult<Message> {
    let mut body = VcMessage::set_document(vc.clone())
        .or_block(ctx)?
        .with_relationships(relationships.to_vec());
    body.tag = ctx.tag().map(str::to_string);
    let message = Message::new(MessageAction::CreateVc, body);
    ctx.services()
        .transport
        .send_message(message, topic, SendOptions::default())
        .await
        .or_block(ctx)
}

/// Submit a presentation and return the sent message.
pub(crate) async fn send_vp(
    ctx: &BlockContext<'_>,
    vp: &Value,
    relationships: &[String],
    topic: &str,
) -> BlockResult<Message> {
    let mut body = VpMessage::set_document(vp.clone())
        .or_block(ctx)?
        .with_relationships(relationships.to_vec());
    if let Some(tag) = ctx.tag() {
        body = body.with_tag(tag);
    }
    let message = Message::new(MessageAction::CreateVp, body);
    ctx.services()
        .transport
        .send_message(message, topic, SendOptions::default())
        .await
        .or_block(ctx)
}

/// Store a credential the block produced, linked to its ledger message.
pub(crate) async fn store_document(
    ctx: &BlockContext<'_>,
    owner: &PolicyUser,
    credential: Value,
    sent: &Message,
    relationships: &[String],
    category: &str,
) -> BlockResult<PolicyDocument> {
    let mut doc = PolicyDocument::new(owner.did.clone(), credential);
    doc.hash = shared_crypto::hash_json_base58(&doc.document).ok();
    doc.group = owner.group.clone();
    doc.policy_id = Some(ctx.policy_id().to_string());
    doc.tag = ctx.tag().map(str::to_string);
    doc.message_id = Some(message_id(sent));
    doc.topic_id = sent.topic_id.clone();
    doc.relationships = relationships.to_vec();
    doc.option.insert("type".into(), Value::from(category));
    ctx.services()
        .documents
        .save_document(doc)
        .await
        .or_block(ctx)
}

/// Key identifying a document in a buffer: its hash, else the hash of its
/// credential, else its id.
pub(crate) fn document_key(doc: &PolicyDocument) -> String {
    doc.hash
        .clone()
        .or_else(|| shared_crypto::hash_json_base58(&doc.document).ok())
        .unwrap_or_else(|| doc.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paths() {
        let value = json!({"a": {"b": [{"c": 5}]}});
        assert_eq!(get_path(&value, "a.b.0.c"), Some(&json!(5)));
        assert_eq!(get_path(&value, "a.x"), None);

        let mut target = json!({"list": [{"v": 1}]});
        assert!(set_path(&mut target, "project.amount", json!(10)));
        assert!(set_path(&mut target, "list.0.v", json!(2)));
        assert!(!set_path(&mut target, "list.3.v", json!(2)));
        assert!(!set_path(&mut target, "list.0.v.deeper", json!(2)));
        assert_eq!(target, json!({"list": [{"v": 2}], "project": {"amount": 10}}));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(as_f64(&json!("40")), Some(40.0));
        assert_eq!(as_f64(&json!(true)), None);
        assert_eq!(number_value(10.0), json!(10));
        assert_eq!(number_value(2.5), json!(2.5));
    }

    #[test]
    fn test_option_helpers() {
        let options = json!({"rule": "  ", "flag": true, "list": [1]});
        let options = options.as_object().unwrap();
        assert_eq!(option_str(options, "rule"), None);
        assert!(option_bool(options, "flag"));
        assert_eq!(option_array(options, "list").len(), 1);
        assert!(option_array(options, "missing").is_empty());
    }
}
