//! Driving port: the transport as seen by policy blocks.

use crate::error::TransportResult;
use async_trait::async_trait;
use pe_01_message_envelope::{Message, MessageAction, MessageType};

/// Per-send options.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Store off-ledger documents first.
    pub send_to_ipfs: bool,
    /// Transaction memo; derived from the message when `None`.
    pub memo: Option<String>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            send_to_ipfs: true,
            memo: None,
        }
    }
}

impl SendOptions {
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    #[must_use]
    pub fn without_ipfs(mut self) -> Self {
        self.send_to_ipfs = false;
        self
    }
}

/// Publishing and retrieval of envelope messages.
#[async_trait]
pub trait MessageTransportApi: Send + Sync {
    /// Store documents, submit to `topic_id`, and return the message with
    /// its consensus id and topic set.
    async fn send_message(
        &self,
        message: Message,
        topic_id: &str,
        options: SendOptions,
    ) -> TransportResult<Message>;

    /// Message by consensus id. `None` when missing or malformed.
    async fn get_message(
        &self,
        consensus_id: &str,
        message_type: Option<MessageType>,
    ) -> TransportResult<Option<Message>>;

    /// Messages on a topic, filtered by type and action. Malformed
    /// entries are skipped.
    async fn get_messages(
        &self,
        topic_id: &str,
        message_type: Option<MessageType>,
        action: Option<MessageAction>,
    ) -> TransportResult<Vec<Message>>;

    /// Hydrate a message's documents from the blob store.
    async fn load_document(&self, message: Message) -> TransportResult<Message>;

    /// Topic a message was published on. `None` on any failure.
    async fn find_topic(&self, consensus_id: &str) -> Option<String>;
}
