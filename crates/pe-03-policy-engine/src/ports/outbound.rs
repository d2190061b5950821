//! Driven ports: storage, identity, credentials and tokens.
//!
//! Blocks reach these through [`PolicyServices`], injected once when the
//! engine is built.

use crate::error::EngineResult;
use async_trait::async_trait;
use pe_02_message_transport::MessageTransportApi;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_bus::EventPublisher;
use shared_types::{PolicyDocument, PolicyUser, TokenInfo};
use std::sync::Arc;

// =============================================================================
// STATE
// =============================================================================

/// Persisted block state, keyed by `(policy, block)` and optionally a user.
#[async_trait]
pub trait StateRepository: Send + Sync {
    async fn find_state(
        &self,
        policy_id: &str,
        block_id: &str,
        user: Option<&str>,
    ) -> EngineResult<Option<Value>>;

    async fn save_state(
        &self,
        policy_id: &str,
        block_id: &str,
        user: Option<&str>,
        state: Value,
    ) -> EngineResult<()>;
}

// =============================================================================
// ROLES
// =============================================================================

/// Users registered in a policy, with their roles.
#[async_trait]
pub trait PolicyRoleRepository: Send + Sync {
    /// Registered user by DID, `None` when the DID holds no role.
    async fn get_user(&self, policy_id: &str, did: &str) -> EngineResult<Option<PolicyUser>>;

    /// Every registered user of the policy.
    async fn get_users(&self, policy_id: &str) -> EngineResult<Vec<PolicyUser>>;

    async fn set_user(&self, policy_id: &str, user: PolicyUser) -> EngineResult<()>;
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Equality filter over stored documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub owner: Option<String>,
    pub group: Option<String>,
    /// Tag of the block that stored the document.
    pub tag: Option<String>,
    /// Matched against credential subject paths, then workflow options.
    pub fields: Map<String, Value>,
}

impl DocumentFilter {
    pub fn matches(&self, doc: &PolicyDocument) -> bool {
        if self.owner.as_ref().is_some_and(|owner| *owner != doc.owner) {
            return false;
        }
        if self.group.is_some() && self.group != doc.group {
            return false;
        }
        if self.tag.is_some() && self.tag != doc.tag {
            return false;
        }
        self.fields.iter().all(|(key, expected)| {
            doc.subject_field(key) == Some(expected) || doc.option.get(key) == Some(expected)
        })
    }
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert or replace by document id.
    async fn save_document(&self, doc: PolicyDocument) -> EngineResult<PolicyDocument>;

    async fn find_documents(
        &self,
        policy_id: &str,
        filter: &DocumentFilter,
    ) -> EngineResult<Vec<PolicyDocument>>;
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Issues and signs credentials on behalf of a DID.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Signed VC over `subject`, with optional evidence.
    async fn create_vc(
        &self,
        issuer: &str,
        subject: Value,
        evidence: Option<Value>,
    ) -> EngineResult<Value>;

    /// Signed VP bundling `credentials`.
    async fn create_vp(&self, issuer: &str, credentials: Vec<Value>) -> EngineResult<Value>;
}

// =============================================================================
// TOKENS
// =============================================================================

/// Units for fungible tokens, serials for NFTs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenAmount {
    Units(u64),
    Serials(Vec<u64>),
}

/// Result of a mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintReceipt {
    pub token_id: String,
    pub amount: u64,
    /// Serials created by an NFT mint.
    pub serials: Vec<u64>,
}

#[async_trait]
pub trait TokenService: Send + Sync {
    async fn get_token(&self, token_id: &str) -> EngineResult<Option<TokenInfo>>;

    /// Mint `amount` units (fungible) or that many serials (NFT) and
    /// transfer them to `account`.
    async fn mint(
        &self,
        token: &TokenInfo,
        account: &str,
        amount: u64,
        memo: &str,
    ) -> EngineResult<MintReceipt>;

    async fn wipe(
        &self,
        token: &TokenInfo,
        account: &str,
        amount: TokenAmount,
        memo: &str,
    ) -> EngineResult<()>;
}

// =============================================================================
// INJECTION
// =============================================================================

/// Everything a running block may call out to.
#[derive(Clone)]
pub struct PolicyServices {
    pub transport: Arc<dyn MessageTransportApi>,
    pub states: Arc<dyn StateRepository>,
    pub roles: Arc<dyn PolicyRoleRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub issuer: Arc<dyn CredentialIssuer>,
    pub tokens: Arc<dyn TokenService>,
    /// Receives update and error notifications.
    pub notifier: Arc<dyn EventPublisher>,
}
