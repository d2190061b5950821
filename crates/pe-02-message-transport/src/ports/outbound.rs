//! Driven ports: what the transport needs from the host.
//!
//! Production hosts back these with a Hedera SDK client and an IPFS
//! gateway; tests and dry runs use the in-memory adapters.

use crate::error::TransportResult;
use async_trait::async_trait;
use pe_01_message_envelope::UrlRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Account and key a message is submitted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorCredentials {
    pub account_id: String,
    /// Also the encryption key for `EVC-Document` payloads.
    pub private_key: String,
}

/// Confirmation returned by the ledger for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Consensus timestamp, `seconds.nanos`.
    pub consensus_id: String,
    pub payer: String,
    pub sequence: u64,
}

/// One message read back from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRecord {
    pub consensus_id: String,
    pub topic_id: String,
    pub payload: String,
}

/// Submits payloads to ledger topics.
#[async_trait]
pub trait LedgerSubmitter: Send + Sync {
    async fn submit(
        &self,
        topic_id: &str,
        operator: Option<&OperatorCredentials>,
        payload: &str,
        memo: &str,
    ) -> TransportResult<SubmitReceipt>;
}

/// Reads topic messages back.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Message by consensus timestamp.
    async fn get_message(&self, consensus_id: &str) -> TransportResult<TopicRecord>;

    /// Every message on a topic, in consensus order.
    async fn get_messages(&self, topic_id: &str) -> TransportResult<Vec<TopicRecord>>;
}

/// Content-addressed storage for off-ledger documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, content: Vec<u8>) -> TransportResult<UrlRef>;

    async fn get(&self, cid: &str) -> TransportResult<Vec<u8>>;
}

/// Maps a user DID to the ledger credentials used on their behalf.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, did: &str) -> TransportResult<Option<OperatorCredentials>>;
}

/// A message kept by a dry-run session instead of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMessageRecord {
    pub dry_run: String,
    /// Fabricated consensus id.
    pub message_id: String,
    pub topic_id: String,
    /// Ledger payload as it would have been submitted.
    pub document: String,
    /// Persistence form of the message.
    pub json: Value,
}

/// Storage for dry-run messages and files.
#[async_trait]
pub trait VirtualMessageStore: Send + Sync {
    async fn save_message(&self, record: VirtualMessageRecord) -> TransportResult<()>;

    async fn get_message(
        &self,
        dry_run: &str,
        message_id: &str,
    ) -> TransportResult<Option<VirtualMessageRecord>>;

    async fn get_messages(
        &self,
        dry_run: &str,
        topic_id: &str,
    ) -> TransportResult<Vec<VirtualMessageRecord>>;

    /// Log a file that would have gone to the blob store.
    async fn save_file(&self, dry_run: &str, url: &UrlRef, content: Vec<u8>) -> TransportResult<()>;
}
