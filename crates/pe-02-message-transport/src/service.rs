//! Message Server - publishes and retrieves envelope messages.

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::ports::inbound::{MessageTransportApi, SendOptions};
use crate::ports::outbound::{
    BlobStore, LedgerReader, LedgerSubmitter, OperatorCredentials, VirtualMessageRecord,
    VirtualMessageStore,
};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use pe_01_message_envelope::{factory, memo, Message, MessageAction, MessageType, UrlRef};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Publishes messages to ledger topics and their documents to blob
/// storage.
///
/// In dry-run mode blobs get a fresh UUID as cid and url, nothing is
/// read back from the blob store, and every sent message is also kept in
/// the virtual store.
#[derive(Clone)]
pub struct MessageServer {
    config: TransportConfig,
    operator: Option<OperatorCredentials>,
    submitter: Arc<dyn LedgerSubmitter>,
    reader: Arc<dyn LedgerReader>,
    blobs: Arc<dyn BlobStore>,
    virtual_store: Arc<dyn VirtualMessageStore>,
}

impl MessageServer {
    pub fn new(
        config: TransportConfig,
        submitter: Arc<dyn LedgerSubmitter>,
        reader: Arc<dyn LedgerReader>,
        blobs: Arc<dyn BlobStore>,
        virtual_store: Arc<dyn VirtualMessageStore>,
    ) -> Self {
        Self {
            config,
            operator: None,
            submitter,
            reader,
            blobs,
            virtual_store,
        }
    }

    /// Copy of this server submitting as `operator`.
    #[must_use]
    pub fn with_operator(&self, operator: OperatorCredentials) -> Self {
        Self {
            operator: Some(operator),
            ..self.clone()
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn key(&self) -> Option<&str> {
        self.operator.as_ref().map(|o| o.private_key.as_str())
    }

    fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.retry_attempts, self.config.retry_delay)
    }

    async fn add_file(&self, content: Vec<u8>) -> TransportResult<UrlRef> {
        if let Some(session) = &self.config.dry_run {
            let id = Uuid::new_v4().to_string();
            let url = UrlRef::new(id.clone(), id);
            self.virtual_store.save_file(session, &url, content).await?;
            return Ok(url);
        }
        self.retry().run("add_file", || self.blobs.put(content.clone())).await
    }

    /// Off-ledger file by cid.
    ///
    /// # Errors
    ///
    /// Always `VirtualFile` in dry-run mode.
    pub async fn get_file(&self, cid: &str) -> TransportResult<Vec<u8>> {
        if self.config.is_dry_run() {
            return Err(TransportError::VirtualFile);
        }
        self.retry().run("get_file", || self.blobs.get(cid)).await
    }

    /// Store the message's documents and record their references.
    ///
    /// # Errors
    ///
    /// Document building or blob storage failure.
    pub async fn send_ipfs(&self, mut message: Message) -> TransportResult<Message> {
        let buffers = message.to_documents(self.key())?;
        let mut urls = Vec::with_capacity(buffers.len());
        for buffer in buffers {
            urls.push(self.add_file(buffer).await?);
        }
        debug!(documents = urls.len(), "[pe-02] documents stored");
        message.set_urls(urls);
        Ok(message)
    }

    /// Submit the ledger payload to `topic_id`.
    ///
    /// # Errors
    ///
    /// `TopicNotSet` for an empty topic; ledger failures after retries.
    pub async fn send_hedera(
        &self,
        mut message: Message,
        topic_id: &str,
        memo: Option<String>,
    ) -> TransportResult<Message> {
        if topic_id.is_empty() {
            return Err(TransportError::TopicNotSet);
        }
        message.set_lang(Some(&self.config.lang));
        let memo = memo.unwrap_or_else(|| memo::message_memo(&message));
        let payload = message.to_message()?;
        let receipt = self
            .retry()
            .run("send_hedera", || {
                self.submitter
                    .submit(topic_id, self.operator.as_ref(), &payload, &memo)
            })
            .await?;

        info!(
            topic_id,
            consensus_id = %receipt.consensus_id,
            message_type = %message.message_type,
            "[pe-02] message submitted"
        );
        message.transaction_memo = Some(memo);
        message.id = Some(receipt.consensus_id);
        message.topic_id = Some(topic_id.to_string());
        message.payer = Some(receipt.payer).filter(|p| !p.is_empty());
        message.index = Some(receipt.sequence);
        Ok(message)
    }

    /// Load every referenced document into the message body.
    ///
    /// # Errors
    ///
    /// Missing files, `VirtualFile` in dry-run, or decryption failure.
    pub async fn load_ipfs(&self, mut message: Message) -> TransportResult<Message> {
        let mut documents = Vec::with_capacity(message.urls().len());
        for url in message.urls() {
            documents.push(self.get_file(&url.cid).await?);
        }
        if !documents.is_empty() {
            message.load_documents(&documents, self.key())?;
        }
        Ok(message)
    }

    fn parse(
        payload: &str,
        message_type: Option<MessageType>,
        consensus_id: &str,
        topic_id: &str,
    ) -> Option<Message> {
        match factory::from_message(payload, message_type) {
            Ok(mut message) => {
                if message_type.is_some_and(|ty| ty != message.message_type) {
                    debug!(consensus_id, "[pe-02] message type mismatch");
                    return None;
                }
                message.id = Some(consensus_id.to_string());
                message.topic_id = Some(topic_id.to_string());
                Some(message)
            }
            Err(err) => {
                warn!(consensus_id, error = %err, "[pe-02] skipping malformed message");
                None
            }
        }
    }

    fn matches(message: &Message, message_type: Option<MessageType>, action: Option<MessageAction>) -> bool {
        message_type.map_or(true, |ty| message.message_type == ty)
            && action.map_or(true, |a| message.action() == a)
    }
}

#[async_trait]
impl MessageTransportApi for MessageServer {
    async fn send_message(
        &self,
        message: Message,
        topic_id: &str,
        options: SendOptions,
    ) -> TransportResult<Message> {
        let message = if options.send_to_ipfs && self.config.send_to_ipfs {
            self.send_ipfs(message).await?
        } else {
            message
        };
        let message = self.send_hedera(message, topic_id, options.memo).await?;

        if let Some(session) = &self.config.dry_run {
            let record = VirtualMessageRecord {
                dry_run: session.clone(),
                message_id: message.id.clone().unwrap_or_default(),
                topic_id: topic_id.to_string(),
                document: message.to_message()?,
                json: message.to_json()?,
            };
            self.virtual_store.save_message(record).await?;
        }
        Ok(message)
    }

    async fn get_message(
        &self,
        consensus_id: &str,
        message_type: Option<MessageType>,
    ) -> TransportResult<Option<Message>> {
        if let Some(session) = &self.config.dry_run {
            let Some(record) = self.virtual_store.get_message(session, consensus_id).await? else {
                return Ok(None);
            };
            return Ok(Self::parse(
                &record.document,
                message_type,
                &record.message_id,
                &record.topic_id,
            ));
        }

        let record = match self
            .retry()
            .run("get_topic_message", || self.reader.get_message(consensus_id))
            .await
        {
            Ok(record) => record,
            Err(TransportError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        match Self::parse(&record.payload, message_type, &record.consensus_id, &record.topic_id) {
            Some(message) => Ok(Some(self.load_ipfs(message).await?)),
            None => Ok(None),
        }
    }

    async fn get_messages(
        &self,
        topic_id: &str,
        message_type: Option<MessageType>,
        action: Option<MessageAction>,
    ) -> TransportResult<Vec<Message>> {
        if topic_id.is_empty() {
            return Err(TransportError::InvalidTopic);
        }
        let items: Vec<(String, String, String)> = if let Some(session) = &self.config.dry_run {
            self.virtual_store
                .get_messages(session, topic_id)
                .await?
                .into_iter()
                .map(|r| (r.document, r.message_id, r.topic_id))
                .collect()
        } else {
            self.retry()
                .run("get_topic_messages", || self.reader.get_messages(topic_id))
                .await?
                .into_iter()
                .map(|r| (r.payload, r.consensus_id, r.topic_id))
                .collect()
        };

        let messages: Vec<Message> = items
            .iter()
            .filter_map(|(payload, id, topic)| Self::parse(payload, None, id, topic))
            .filter(|m| Self::matches(m, message_type, action))
            .collect();
        debug!(topic_id, count = messages.len(), "[pe-02] topic messages read");
        Ok(messages)
    }

    async fn load_document(&self, message: Message) -> TransportResult<Message> {
        self.load_ipfs(message).await
    }

    async fn find_topic(&self, consensus_id: &str) -> Option<String> {
        if consensus_id.is_empty() {
            return None;
        }
        self.retry()
            .run("find_topic", || self.reader.get_message(consensus_id))
            .await
            .ok()
            .map(|record| record.topic_id)
    }
}
