//! In-memory adapters for every engine port.
//!
//! Used by tests and by the single-process runtime. [`InMemoryBackend`]
//! wires them together with an in-memory ledger and event bus.

use crate::error::{EngineResult, PolicyEngineError};
use crate::ports::outbound::{
    CredentialIssuer, DocumentFilter, DocumentRepository, MintReceipt, PolicyRoleRepository,
    PolicyServices, StateRepository, TokenAmount, TokenService,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use pe_02_message_transport::adapters::{InMemoryBlobStore, InMemoryLedger, InMemoryVirtualStore};
use pe_02_message_transport::{MessageServer, TransportConfig};
use serde_json::{json, Value};
use shared_bus::InMemoryEventBus;
use shared_crypto::hash_json_base58;
use shared_types::{PolicyDocument, PolicyUser, TokenInfo, TokenType};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

type StateKey = (String, String, Option<String>);

// =============================================================================
// STATE
// =============================================================================

#[derive(Default)]
pub struct InMemoryStateRepository {
    states: RwLock<HashMap<StateKey, Value>>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, policy_id: &str, block_id: &str) -> Option<Value> {
        self.states
            .read()
            .get(&(policy_id.to_string(), block_id.to_string(), None))
            .cloned()
    }
}

#[async_trait]
impl StateRepository for InMemoryStateRepository {
    async fn find_state(
        &self,
        policy_id: &str,
        block_id: &str,
        user: Option<&str>,
    ) -> EngineResult<Option<Value>> {
        let key = (policy_id.to_string(), block_id.to_string(), user.map(str::to_string));
        Ok(self.states.read().get(&key).cloned())
    }

    async fn save_state(
        &self,
        policy_id: &str,
        block_id: &str,
        user: Option<&str>,
        state: Value,
    ) -> EngineResult<()> {
        let key = (policy_id.to_string(), block_id.to_string(), user.map(str::to_string));
        self.states.write().insert(key, state);
        Ok(())
    }
}

// =============================================================================
// ROLES
// =============================================================================

#[derive(Default)]
pub struct InMemoryRoleRepository {
    users: RwLock<HashMap<String, Vec<PolicyUser>>>,
}

impl InMemoryRoleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRoleRepository for InMemoryRoleRepository {
    async fn get_user(&self, policy_id: &str, did: &str) -> EngineResult<Option<PolicyUser>> {
        Ok(self
            .users
            .read()
            .get(policy_id)
            .and_then(|users| users.iter().find(|u| u.did == did))
            .cloned())
    }

    async fn get_users(&self, policy_id: &str) -> EngineResult<Vec<PolicyUser>> {
        Ok(self.users.read().get(policy_id).cloned().unwrap_or_default())
    }

    async fn set_user(&self, policy_id: &str, user: PolicyUser) -> EngineResult<()> {
        let mut users = self.users.write();
        let list = users.entry(policy_id.to_string()).or_default();
        list.retain(|u| u.did != user.did);
        list.push(user);
        Ok(())
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

#[derive(Default)]
pub struct InMemoryDocumentRepository {
    documents: RwLock<Vec<PolicyDocument>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn save_document(&self, doc: PolicyDocument) -> EngineResult<PolicyDocument> {
        let mut documents = self.documents.write();
        match documents.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc.clone(),
            None => documents.push(doc.clone()),
        }
        Ok(doc)
    }

    async fn find_documents(
        &self,
        policy_id: &str,
        filter: &DocumentFilter,
    ) -> EngineResult<Vec<PolicyDocument>> {
        Ok(self
            .documents
            .read()
            .iter()
            .filter(|d| d.policy_id.as_deref() == Some(policy_id) && filter.matches(d))
            .cloned()
            .collect())
    }
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Issues credentials with a content-hash proof. Not a real signature.
#[derive(Default)]
pub struct LocalCredentialIssuer;

impl LocalCredentialIssuer {
    pub fn new() -> Self {
        Self
    }

    fn proof(issuer: &str, body: &Value) -> EngineResult<Value> {
        let proof_value =
            hash_json_base58(body).map_err(|err| PolicyEngineError::issuer(err.to_string()))?;
        Ok(json!({
            "type": "Ed25519Signature2018",
            "created": Utc::now().to_rfc3339(),
            "verificationMethod": format!("{issuer}#did-root-key"),
            "proofPurpose": "assertionMethod",
            "jws": proof_value,
        }))
    }
}

#[async_trait]
impl CredentialIssuer for LocalCredentialIssuer {
    async fn create_vc(
        &self,
        issuer: &str,
        subject: Value,
        evidence: Option<Value>,
    ) -> EngineResult<Value> {
        let mut vc = json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "id": format!("urn:uuid:{}", Uuid::new_v4()),
            "type": ["VerifiableCredential"],
            "issuer": issuer,
            "issuanceDate": Utc::now().to_rfc3339(),
            "credentialSubject": [subject],
        });
        if let Some(evidence) = evidence {
            vc["evidence"] = evidence;
        }
        vc["proof"] = Self::proof(issuer, &vc)?;
        Ok(vc)
    }

    async fn create_vp(&self, issuer: &str, credentials: Vec<Value>) -> EngineResult<Value> {
        let mut vp = json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "id": format!("urn:uuid:{}", Uuid::new_v4()),
            "type": ["VerifiablePresentation"],
            "verifiableCredential": credentials,
        });
        vp["proof"] = Self::proof(issuer, &vp)?;
        Ok(vp)
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// A recorded mint or wipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOperation {
    Mint {
        token_id: String,
        account: String,
        amount: u64,
        memo: String,
    },
    Wipe {
        token_id: String,
        account: String,
        amount: TokenAmount,
        memo: String,
    },
}

#[derive(Default)]
struct TokenLedger {
    tokens: HashMap<String, TokenInfo>,
    balances: HashMap<(String, String), u64>,
    serials: HashMap<(String, String), Vec<u64>>,
    next_serial: HashMap<String, u64>,
    operations: Vec<TokenOperation>,
}

/// Token registry and balances kept in memory.
#[derive(Default)]
pub struct InMemoryTokenService {
    ledger: RwLock<TokenLedger>,
}

impl InMemoryTokenService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_token(&self, token: TokenInfo) {
        self.ledger.write().tokens.insert(token.token_id.clone(), token);
    }

    /// Fungible units, or NFT serial count, held by `account`.
    pub fn balance(&self, token_id: &str, account: &str) -> u64 {
        let ledger = self.ledger.read();
        let key = (token_id.to_string(), account.to_string());
        match ledger.tokens.get(token_id).map(|t| t.token_type) {
            Some(TokenType::NonFungible) => {
                ledger.serials.get(&key).map_or(0, |s| s.len() as u64)
            }
            _ => ledger.balances.get(&key).copied().unwrap_or(0),
        }
    }

    pub fn operations(&self) -> Vec<TokenOperation> {
        self.ledger.read().operations.clone()
    }
}

#[async_trait]
impl TokenService for InMemoryTokenService {
    async fn get_token(&self, token_id: &str) -> EngineResult<Option<TokenInfo>> {
        Ok(self.ledger.read().tokens.get(token_id).cloned())
    }

    async fn mint(
        &self,
        token: &TokenInfo,
        account: &str,
        amount: u64,
        memo: &str,
    ) -> EngineResult<MintReceipt> {
        let mut ledger = self.ledger.write();
        if !ledger.tokens.contains_key(&token.token_id) {
            return Err(PolicyEngineError::token(format!(
                "Token {} not found",
                token.token_id
            )));
        }
        let key = (token.token_id.clone(), account.to_string());
        let mut serials = Vec::new();
        match token.token_type {
            TokenType::Fungible => *ledger.balances.entry(key).or_default() += amount,
            TokenType::NonFungible => {
                let next = ledger.next_serial.entry(token.token_id.clone()).or_insert(1);
                serials = (*next..*next + amount).collect();
                *next += amount;
                ledger.serials.entry(key).or_default().extend(&serials);
            }
        }
        ledger.operations.push(TokenOperation::Mint {
            token_id: token.token_id.clone(),
            account: account.to_string(),
            amount,
            memo: memo.to_string(),
        });
        Ok(MintReceipt {
            token_id: token.token_id.clone(),
            amount,
            serials,
        })
    }

    async fn wipe(
        &self,
        token: &TokenInfo,
        account: &str,
        amount: TokenAmount,
        memo: &str,
    ) -> EngineResult<()> {
        let mut ledger = self.ledger.write();
        let key = (token.token_id.clone(), account.to_string());
        match &amount {
            TokenAmount::Units(units) => {
                let balance = ledger.balances.entry(key).or_default();
                if *balance < *units {
                    return Err(PolicyEngineError::token("Insufficient token balance"));
                }
                *balance -= units;
            }
            TokenAmount::Serials(wiped) => {
                let held = ledger.serials.entry(key).or_default();
                if !wiped.iter().all(|s| held.contains(s)) {
                    return Err(PolicyEngineError::token("Serial number not owned"));
                }
                held.retain(|s| !wiped.contains(s));
            }
        }
        ledger.operations.push(TokenOperation::Wipe {
            token_id: token.token_id.clone(),
            account: account.to_string(),
            amount,
            memo: memo.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// WIRING
// =============================================================================

/// Every in-memory adapter, with handles kept for inspection.
pub struct InMemoryBackend {
    pub ledger: Arc<InMemoryLedger>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub virtual_store: Arc<InMemoryVirtualStore>,
    pub transport: Arc<MessageServer>,
    pub states: Arc<InMemoryStateRepository>,
    pub roles: Arc<InMemoryRoleRepository>,
    pub documents: Arc<InMemoryDocumentRepository>,
    pub issuer: Arc<LocalCredentialIssuer>,
    pub tokens: Arc<InMemoryTokenService>,
    pub bus: Arc<InMemoryEventBus>,
}

impl InMemoryBackend {
    pub fn new(config: TransportConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let virtual_store = Arc::new(InMemoryVirtualStore::new());
        let transport = Arc::new(MessageServer::new(
            config,
            ledger.clone(),
            ledger.clone(),
            blobs.clone(),
            virtual_store.clone(),
        ));
        Self {
            ledger,
            blobs,
            virtual_store,
            transport,
            states: Arc::new(InMemoryStateRepository::new()),
            roles: Arc::new(InMemoryRoleRepository::new()),
            documents: Arc::new(InMemoryDocumentRepository::new()),
            issuer: Arc::new(LocalCredentialIssuer::new()),
            tokens: Arc::new(InMemoryTokenService::new()),
            bus: Arc::new(InMemoryEventBus::new()),
        }
    }

    pub fn services(&self) -> PolicyServices {
        PolicyServices {
            transport: self.transport.clone(),
            states: self.states.clone(),
            roles: self.roles.clone(),
            documents: self.documents.clone(),
            issuer: self.issuer.clone(),
            tokens: self.tokens.clone(),
            notifier: self.bus.clone(),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

/// Services backed by a fresh [`InMemoryBackend`].
pub fn in_memory_services() -> PolicyServices {
    InMemoryBackend::default().services()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(token_type: TokenType) -> TokenInfo {
        TokenInfo {
            token_id: "0.0.500".into(),
            token_name: "Carbon".into(),
            token_symbol: "CRB".into(),
            token_type,
            decimals: 2,
            owner: None,
        }
    }

    #[tokio::test]
    async fn test_state_keyed_by_user() {
        let repo = InMemoryStateRepository::new();
        repo.save_state("p", "b", None, json!({"a": 1})).await.unwrap();
        repo.save_state("p", "b", Some("did:x"), json!({"a": 2})).await.unwrap();

        assert_eq!(repo.find_state("p", "b", None).await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(
            repo.find_state("p", "b", Some("did:x")).await.unwrap(),
            Some(json!({"a": 2}))
        );
        assert_eq!(repo.find_state("p", "c", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_roles_replace_by_did() {
        let repo = InMemoryRoleRepository::new();
        repo.set_user("p", PolicyUser::new("did:a").with_role("Installer")).await.unwrap();
        repo.set_user("p", PolicyUser::new("did:a").with_role("Auditor")).await.unwrap();

        let users = repo.get_users("p").await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role.as_deref(), Some("Auditor"));
        assert!(repo.get_user("q", "did:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_documents_upsert_and_filter() {
        let repo = InMemoryDocumentRepository::new();
        let mut doc = PolicyDocument::new("did:a", json!({}));
        doc.policy_id = Some("p".into());
        repo.save_document(doc.clone()).await.unwrap();
        doc.tag = Some("t".into());
        repo.save_document(doc).await.unwrap();

        assert_eq!(repo.len(), 1);
        let filter = DocumentFilter {
            tag: Some("t".into()),
            ..DocumentFilter::default()
        };
        assert_eq!(repo.find_documents("p", &filter).await.unwrap().len(), 1);
        assert!(repo.find_documents("other", &filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_issuer_builds_vc_and_vp() {
        let issuer = LocalCredentialIssuer::new();
        let vc = issuer
            .create_vc("did:i", json!({"amount": 5}), Some(json!([{"type": ["SourceDocument"]}])))
            .await
            .unwrap();
        assert_eq!(vc["issuer"], json!("did:i"));
        assert_eq!(vc["credentialSubject"][0]["amount"], json!(5));
        assert!(vc["evidence"].is_array());
        assert!(vc["proof"]["jws"].is_string());

        let vp = issuer.create_vp("did:i", vec![vc]).await.unwrap();
        assert_eq!(vp["verifiableCredential"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fungible_mint_and_wipe() {
        let service = InMemoryTokenService::new();
        let token = token(TokenType::Fungible);
        service.add_token(token.clone());

        service.mint(&token, "0.0.7", 150, "memo").await.unwrap();
        assert_eq!(service.balance("0.0.500", "0.0.7"), 150);

        service.wipe(&token, "0.0.7", TokenAmount::Units(50), "").await.unwrap();
        assert_eq!(service.balance("0.0.500", "0.0.7"), 100);

        let err = service.wipe(&token, "0.0.7", TokenAmount::Units(500), "").await;
        assert!(err.is_err());
        assert_eq!(service.operations().len(), 2);
    }

    #[tokio::test]
    async fn test_nft_serials() {
        let service = InMemoryTokenService::new();
        let token = token(TokenType::NonFungible);
        service.add_token(token.clone());

        let receipt = service.mint(&token, "0.0.7", 3, "").await.unwrap();
        assert_eq!(receipt.serials, vec![1, 2, 3]);

        service
            .wipe(&token, "0.0.7", TokenAmount::Serials(vec![2]), "")
            .await
            .unwrap();
        assert_eq!(service.balance("0.0.500", "0.0.7"), 2);
        assert!(service
            .wipe(&token, "0.0.7", TokenAmount::Serials(vec![2]), "")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_token_mint_fails() {
        let service = InMemoryTokenService::new();
        let err = service.mint(&token(TokenType::Fungible), "0.0.7", 1, "").await;
        assert!(matches!(err, Err(PolicyEngineError::Token { .. })));
    }
}
