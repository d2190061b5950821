//! # Message Envelope Layer
//!
//! Versioned, hashable messages recording policy, schema, credential and
//! token facts on a ledger topic, with large payloads stored off-ledger.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────── Message ────────────────────────┐
//! │ header: messageId, type, action, status, lang, account   │
//! │ status payload (exactly one per status)                  │
//! │ body: MessageBody::{Did, Vc, Vp, Schema, Policy, ...}    │
//! │ urls: [{cid, url}] ──► off-ledger documents, by position │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`Message::to_message`] produces the ledger payload.
//! - [`Message::to_documents`] produces the off-ledger buffers
//!   (encrypted for `EVC-Document`).
//! - [`factory::from_message`] parses a payload back, failing closed on
//!   unknown types.
//!
//! ## Example
//!
//! ```rust
//! use pe_01_message_envelope::{factory, Message, MessageAction, VcMessage};
//! use serde_json::json;
//!
//! let body = VcMessage::set_document(json!({
//!     "issuer": "did:hedera:issuer",
//!     "credentialSubject": [{ "amount": 5 }]
//! })).unwrap();
//! let message = Message::new(MessageAction::CreateVc, body);
//!
//! let payload = message.to_message().unwrap();
//! let parsed = factory::from_message(&payload, None).unwrap();
//! assert_eq!(parsed.owner(), Some("did:hedera:issuer"));
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod error;
pub mod factory;
pub mod memo;
pub mod messages;

pub use domain::{
    Message, MessageAction, MessageStatus, MessageType, RevokeReason, UrlRef, UrlType, DEFAULT_LANG,
};
pub use error::{EnvelopeError, Result};
pub use messages::{
    ContractMessage, DidMessage, MessageBody, MessageContent, ModuleMessage, PolicyMessage,
    RegistrationMessage, RoleMessage, SchemaMessage, SynchronizationMessage, TagMessage,
    TokenMessage, ToolMessage, TopicMessage, VcMessage, VpMessage, POLICY_MESSAGE_MAX_SIZE,
    TRUNCATED_FIELD_MIN_LEN,
};
