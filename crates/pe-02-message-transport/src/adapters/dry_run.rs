//! Ledger stand-in for dry-run sessions.

use crate::error::{TransportError, TransportResult};
use crate::ports::outbound::{
    LedgerReader, LedgerSubmitter, OperatorCredentials, SubmitReceipt, TopicRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Accepts every submission and fabricates its consensus metadata. Reads
/// always miss: dry-run messages are served from the virtual store.
pub struct DryRunLedger {
    epoch_secs: i64,
    counter: AtomicU64,
}

impl Default for DryRunLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunLedger {
    pub fn new() -> Self {
        Self {
            epoch_secs: Utc::now().timestamp(),
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl LedgerSubmitter for DryRunLedger {
    async fn submit(
        &self,
        topic_id: &str,
        operator: Option<&OperatorCredentials>,
        _payload: &str,
        _memo: &str,
    ) -> TransportResult<SubmitReceipt> {
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let consensus_id = format!("{}.{:09}", self.epoch_secs, sequence);
        debug!(topic_id, consensus_id = %consensus_id, "[pe-02] dry-run submission");
        Ok(SubmitReceipt {
            consensus_id,
            payer: operator.map(|o| o.account_id.clone()).unwrap_or_default(),
            sequence,
        })
    }
}

#[async_trait]
impl LedgerReader for DryRunLedger {
    async fn get_message(&self, consensus_id: &str) -> TransportResult<TopicRecord> {
        Err(TransportError::NotFound(consensus_id.to_string()))
    }

    async fn get_messages(&self, _topic_id: &str) -> TransportResult<Vec<TopicRecord>> {
        Ok(Vec::new())
    }
}
