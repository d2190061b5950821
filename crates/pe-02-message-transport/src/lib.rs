//! # Message Transport
//!
//! Moves envelope messages between the policy engine, a ledger topic and
//! a content-addressed blob store.
//!
//! ```text
//!                    ┌──────────────► BlobStore (documents, by cid)
//! Message ──► MessageServer
//!                    └──────────────► LedgerSubmitter (payload + memo)
//!                                          │ receipt: consensus id, payer, seq
//!                    ◄─────────────────────┘
//! ```
//!
//! ## Send pipeline
//!
//! 1. Store each document from `to_documents`, record `{cid, url}` refs.
//! 2. Stamp language and memo, submit `to_message()` as a retryable task.
//! 3. Record consensus id, topic, payer and sequence on the message.
//! 4. Dry run: keep a copy in the virtual store.
//!
//! Reads fail soft: `get_message` yields `None` and `get_messages` skips
//! entries that do not parse.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod error;
pub mod ports;
pub mod retry;
pub mod service;

pub use config::{ConfigError, TransportConfig, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
pub use error::{TransportError, TransportResult};
pub use ports::{
    BlobStore, CredentialResolver, LedgerReader, LedgerSubmitter, MessageTransportApi,
    OperatorCredentials, SendOptions, SubmitReceipt, TopicRecord, VirtualMessageRecord,
    VirtualMessageStore,
};
pub use retry::RetryPolicy;
pub use service::MessageServer;
