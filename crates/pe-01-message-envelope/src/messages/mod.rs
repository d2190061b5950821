//! # Message Bodies
//!
//! One module per concrete message kind. Every body is a plain serde struct
//! whose serialized fields are exactly its wire fields; off-ledger payloads
//! live in `#[serde(skip)]` fields and travel through
//! [`MessageContent::to_documents`] instead.
//!
//! [`MessageBody`] is the closed set of bodies. Dispatch over it is a
//! `match`, so adding a kind is a compile-time change.

mod contract;
mod did;
mod module;
mod policy;
mod registration;
mod role;
mod schema;
mod synchronization;
mod tag;
mod token;
mod tool;
mod topic;
mod vc;
mod vp;

pub use contract::ContractMessage;
pub use did::DidMessage;
pub use module::ModuleMessage;
pub use policy::{PolicyMessage, POLICY_MESSAGE_MAX_SIZE, TRUNCATED_FIELD_MIN_LEN};
pub use registration::RegistrationMessage;
pub use role::RoleMessage;
pub use schema::SchemaMessage;
pub use synchronization::SynchronizationMessage;
pub use tag::TagMessage;
pub use token::TokenMessage;
pub use tool::ToolMessage;
pub use topic::TopicMessage;
pub use vc::VcMessage;
pub use vp::VpMessage;

use crate::domain::{MessageAction, MessageType};
use crate::error::{EnvelopeError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Behavior each concrete body supplies.
pub trait MessageContent: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Types this body may be published under; the first is the default.
    const TYPES: &'static [MessageType];

    /// `(cid key, url key)` per off-ledger document, by position.
    const URL_FIELDS: &'static [(&'static str, &'static str)] = &[];

    /// Adjust the assembled wire object for the current action.
    fn shape_object(&self, _action: MessageAction, _object: &mut Map<String, Value>) {}

    /// Off-ledger payloads, in `URL_FIELDS` order.
    fn to_documents(
        &self,
        _ty: MessageType,
        _action: MessageAction,
        _key: Option<&str>,
    ) -> Result<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }

    /// Inverse of `to_documents`.
    fn load_documents(
        &mut self,
        _ty: MessageType,
        _documents: &[Vec<u8>],
        _key: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    /// Stable subset hashed by `Message::to_hash`.
    fn hash_object(&self) -> Value;

    /// Identity that issued or owns the fact.
    fn owner(&self) -> Option<&str>;

    /// Ledger ids this message links to.
    fn relationships(&self) -> Vec<String> {
        Vec::new()
    }

    /// Required fields present.
    fn validate(&self) -> bool {
        true
    }
}

macro_rules! bodies {
    ($($variant:ident($body:ty)),+ $(,)?) => {
        /// Closed set of message bodies.
        #[derive(Debug, Clone, PartialEq)]
        pub enum MessageBody {
            $($variant($body),)+
        }

        impl MessageBody {
            /// Types the body accepts.
            pub fn types(&self) -> &'static [MessageType] {
                match self {
                    $(Self::$variant(_) => <$body>::TYPES,)+
                }
            }

            pub(crate) fn url_fields(&self) -> &'static [(&'static str, &'static str)] {
                match self {
                    $(Self::$variant(_) => <$body>::URL_FIELDS,)+
                }
            }

            /// Parse the body registered for `ty` out of a wire object.
            pub(crate) fn read(ty: MessageType, object: &Map<String, Value>) -> Result<Self> {
                $(
                    if <$body>::TYPES.contains(&ty) {
                        let body: $body = serde_json::from_value(Value::Object(object.clone()))?;
                        return Ok(Self::$variant(body));
                    }
                )+
                Err(EnvelopeError::InvalidFormat(ty.as_str().to_string()))
            }

            pub(crate) fn write_fields(&self) -> Result<Map<String, Value>> {
                let value = match self {
                    $(Self::$variant(body) => serde_json::to_value(body)?,)+
                };
                match value {
                    Value::Object(map) => Ok(map),
                    _ => Ok(Map::new()),
                }
            }

            pub(crate) fn shape_object(&self, action: MessageAction, object: &mut Map<String, Value>) {
                match self {
                    $(Self::$variant(body) => body.shape_object(action, object),)+
                }
            }

            pub(crate) fn to_documents(
                &self,
                ty: MessageType,
                action: MessageAction,
                key: Option<&str>,
            ) -> Result<Vec<Vec<u8>>> {
                match self {
                    $(Self::$variant(body) => body.to_documents(ty, action, key),)+
                }
            }

            pub(crate) fn load_documents(
                &mut self,
                ty: MessageType,
                documents: &[Vec<u8>],
                key: Option<&str>,
            ) -> Result<()> {
                match self {
                    $(Self::$variant(body) => body.load_documents(ty, documents, key),)+
                }
            }

            pub(crate) fn hash_object(&self) -> Value {
                match self {
                    $(Self::$variant(body) => body.hash_object(),)+
                }
            }

            /// Identity that issued or owns the fact.
            pub fn owner(&self) -> Option<&str> {
                match self {
                    $(Self::$variant(body) => body.owner(),)+
                }
            }

            /// Ledger ids this message links to.
            pub fn relationships(&self) -> Vec<String> {
                match self {
                    $(Self::$variant(body) => body.relationships(),)+
                }
            }

            pub(crate) fn validate(&self) -> bool {
                match self {
                    $(Self::$variant(body) => body.validate(),)+
                }
            }
        }

        $(
            impl From<$body> for MessageBody {
                fn from(body: $body) -> Self {
                    Self::$variant(body)
                }
            }
        )+
    };
}

bodies! {
    Did(DidMessage),
    Vc(VcMessage),
    Vp(VpMessage),
    Schema(SchemaMessage),
    Policy(PolicyMessage),
    Token(TokenMessage),
    Tag(TagMessage),
    Module(ModuleMessage),
    Tool(ToolMessage),
    Topic(TopicMessage),
    Registration(RegistrationMessage),
    Synchronization(SynchronizationMessage),
    Role(RoleMessage),
    Contract(ContractMessage),
}

/// Serialize a JSON document for off-ledger storage.
pub(crate) fn json_buffer(document: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(document)?)
}

/// Parse an off-ledger JSON document.
pub(crate) fn parse_json_buffer(buffer: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(buffer)?)
}

/// Ensure exactly `expected` buffers were handed in.
pub(crate) fn expect_documents(documents: &[Vec<u8>], expected: usize) -> Result<()> {
    if documents.len() != expected {
        return Err(EnvelopeError::DocumentCount {
            expected,
            actual: documents.len(),
        });
    }
    Ok(())
}

/// Hash of a credential document, used as the body's `hash` field.
pub(crate) fn document_hash(document: &Value) -> Result<String> {
    Ok(shared_crypto::hash_json_base58(document)?)
}

/// Issuer DID of a credential, string or `{ "id": ... }` form.
pub(crate) fn credential_issuer(document: &Value) -> Option<String> {
    match document.get("issuer")? {
        Value::String(did) => Some(did.clone()),
        Value::Object(map) => map.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
