//! In-memory adapters for tests and single-process runs.

use crate::error::{TransportError, TransportResult};
use crate::ports::outbound::{
    BlobStore, CredentialResolver, LedgerReader, LedgerSubmitter, OperatorCredentials,
    SubmitReceipt, TopicRecord, VirtualMessageRecord, VirtualMessageStore,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use pe_01_message_envelope::UrlRef;
use shared_crypto::hash_base58;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
struct LedgerState {
    records: Vec<TopicRecord>,
    memos: HashMap<String, String>,
    sequences: HashMap<String, u64>,
}

/// Ledger kept in memory. Consensus ids are strictly increasing.
pub struct InMemoryLedger {
    epoch_secs: i64,
    state: RwLock<LedgerState>,
    pending_failures: AtomicU32,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            epoch_secs: Utc::now().timestamp(),
            state: RwLock::new(LedgerState::default()),
            pending_failures: AtomicU32::new(0),
        }
    }

    /// Reject the next `count` submissions with a recoverable error.
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Memo recorded with a submission.
    pub fn memo(&self, consensus_id: &str) -> Option<String> {
        self.state.read().memos.get(consensus_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a raw payload, bypassing the envelope layer.
    pub fn push_raw(&self, topic_id: &str, payload: &str) -> String {
        let mut state = self.state.write();
        let consensus_id = self.next_id(state.records.len());
        state.records.push(TopicRecord {
            consensus_id: consensus_id.clone(),
            topic_id: topic_id.to_string(),
            payload: payload.to_string(),
        });
        consensus_id
    }

    fn next_id(&self, position: usize) -> String {
        format!("{}.{:09}", self.epoch_secs, position + 1)
    }
}

#[async_trait]
impl LedgerSubmitter for InMemoryLedger {
    async fn submit(
        &self,
        topic_id: &str,
        operator: Option<&OperatorCredentials>,
        payload: &str,
        memo: &str,
    ) -> TransportResult<SubmitReceipt> {
        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::ledger("node unavailable"));
        }

        let mut state = self.state.write();
        let consensus_id = self.next_id(state.records.len());
        state.records.push(TopicRecord {
            consensus_id: consensus_id.clone(),
            topic_id: topic_id.to_string(),
            payload: payload.to_string(),
        });
        state.memos.insert(consensus_id.clone(), memo.to_string());
        let sequence = state.sequences.entry(topic_id.to_string()).or_insert(0);
        *sequence += 1;
        Ok(SubmitReceipt {
            consensus_id,
            payer: operator.map(|o| o.account_id.clone()).unwrap_or_default(),
            sequence: *sequence,
        })
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedger {
    async fn get_message(&self, consensus_id: &str) -> TransportResult<TopicRecord> {
        self.state
            .read()
            .records
            .iter()
            .find(|r| r.consensus_id == consensus_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(consensus_id.to_string()))
    }

    async fn get_messages(&self, topic_id: &str) -> TransportResult<Vec<TopicRecord>> {
        Ok(self
            .state
            .read()
            .records
            .iter()
            .filter(|r| r.topic_id == topic_id)
            .cloned()
            .collect())
    }
}

/// Content-addressed blob store; the cid is the base58 SHA-256 digest.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, content: Vec<u8>) -> TransportResult<UrlRef> {
        let cid = hash_base58(&content);
        let url = format!("ipfs://{cid}");
        self.blobs.write().insert(cid.clone(), content);
        Ok(UrlRef::new(cid, url))
    }

    async fn get(&self, cid: &str) -> TransportResult<Vec<u8>> {
        self.blobs
            .read()
            .get(cid)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(cid.to_string()))
    }
}

/// Dry-run messages and file log.
#[derive(Default)]
pub struct InMemoryVirtualStore {
    messages: RwLock<Vec<VirtualMessageRecord>>,
    files: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryVirtualStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_count(&self, dry_run: &str) -> usize {
        self.files.read().keys().filter(|(d, _)| d == dry_run).count()
    }
}

#[async_trait]
impl VirtualMessageStore for InMemoryVirtualStore {
    async fn save_message(&self, record: VirtualMessageRecord) -> TransportResult<()> {
        self.messages.write().push(record);
        Ok(())
    }

    async fn get_message(
        &self,
        dry_run: &str,
        message_id: &str,
    ) -> TransportResult<Option<VirtualMessageRecord>> {
        Ok(self
            .messages
            .read()
            .iter()
            .find(|r| r.dry_run == dry_run && r.message_id == message_id)
            .cloned())
    }

    async fn get_messages(
        &self,
        dry_run: &str,
        topic_id: &str,
    ) -> TransportResult<Vec<VirtualMessageRecord>> {
        Ok(self
            .messages
            .read()
            .iter()
            .filter(|r| r.dry_run == dry_run && r.topic_id == topic_id)
            .cloned()
            .collect())
    }

    async fn save_file(&self, dry_run: &str, url: &UrlRef, content: Vec<u8>) -> TransportResult<()> {
        self.files
            .write()
            .insert((dry_run.to_string(), url.cid.clone()), content);
        Ok(())
    }
}

/// Fixed DID → credentials table.
#[derive(Default)]
pub struct StaticCredentialResolver {
    entries: RwLock<HashMap<String, OperatorCredentials>>,
}

impl StaticCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, did: impl Into<String>, credentials: OperatorCredentials) {
        self.entries.write().insert(did.into(), credentials);
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, did: &str) -> TransportResult<Option<OperatorCredentials>> {
        Ok(self.entries.read().get(did).cloned())
    }
}
