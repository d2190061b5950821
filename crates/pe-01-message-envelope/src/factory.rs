//! Parse ledger payloads into typed messages.
//!
//! Factories fail closed: an empty object, an unknown or body-less `type`,
//! or a body that fails validation is an error. Callers that scan many
//! messages catch [`EnvelopeError::is_malformed`] and move on.

use crate::domain::{message::read_type, Message, MessageType};
use crate::error::{EnvelopeError, Result};
use crate::messages::MessageContent;
use serde_json::{json, Map, Value};
use tracing::warn;

/// Parse a ledger payload string. `fallback` fills a missing `type`.
///
/// # Errors
///
/// See [`from_message_object`]; undecodable JSON is a serialization error.
pub fn from_message(text: &str, fallback: Option<MessageType>) -> Result<Message> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Object(object) => from_message_object(object, fallback),
        Value::Null => Err(EnvelopeError::EmptyObject),
        _ => Err(EnvelopeError::InvalidFormat("UNKNOWN TYPE".to_string())),
    }
}

/// Parse a ledger wire object.
///
/// # Errors
///
/// `EmptyObject`, `InvalidFormat`, `InvalidAction` or `InvalidJson`.
pub fn from_message_object(mut object: Map<String, Value>, fallback: Option<MessageType>) -> Result<Message> {
    if object.is_empty() {
        return Err(EnvelopeError::EmptyObject);
    }
    if !object.contains_key("type") {
        if let Some(ty) = fallback {
            object.insert("type".into(), json!(ty));
        }
    }
    let message_type = read_type(&object).inspect_err(|err| {
        warn!("[pe-01] {err}");
    })?;
    let message = Message::read_object(message_type, &object)?;
    if !message.validate() {
        warn!(message_type = %message_type, "[pe-01] Invalid json");
        return Err(EnvelopeError::InvalidJson);
    }
    Ok(message)
}

/// Parse a wire object that must belong to body `T`.
///
/// # Errors
///
/// `InvalidMessageType` when the declared type is not one of `T`'s; the
/// errors of [`from_message_object`] otherwise.
pub fn from_message_object_as<T: MessageContent>(object: Map<String, Value>) -> Result<Message> {
    let declared = object
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let fits = MessageType::parse(&declared).is_some_and(|ty| T::TYPES.contains(&ty));
    if !fits {
        return Err(EnvelopeError::InvalidMessageType {
            expected: crate::domain::message::type_group(T::TYPES),
            actual: declared,
        });
    }
    from_message_object(object, None)
}
