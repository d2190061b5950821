//! # Integration Fixtures
//!
//! A registry with every domain block plus [`RECORDER`], a terminal block
//! that stores what it receives so flows can be asserted from the outside.

use async_trait::async_trait;
use parking_lot::Mutex;
use pe_02_message_transport::TransportConfig;
use pe_03_policy_engine::adapters::InMemoryBackend;
use pe_03_policy_engine::{
    BlockContext, BlockDescriptor, BlockRegistry, BlockResult, BlockRole, DocumentFilter,
    DocumentRepository, EngineResult, EventData, PolicyBlock, PolicyEngine, PolicyEngineApi,
    PolicyEvent,
};
use serde_json::{json, Value};
use shared_bus::{EngineEvent, EventFilter, Subscription};
use shared_types::{
    BlockConfig, EventActor, EventConfig, PolicyConfig, PolicyDocument, PolicyEventType,
    PolicyStatus, PolicyUser, TokenInfo, TokenType,
};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const RECORDER: &str = "recorderBlock";
pub const POLICY_ID: &str = "policy-1";
pub const OWNER: &str = "did:hedera:testnet:registry";
pub const INSTANCE_TOPIC: &str = "0.0.5000";
pub const TOKEN_ID: &str = "0.0.7000";
pub const ACCOUNT: &str = "0.0.4001";

/// Saves each received document under its own tag; `option.event` is the
/// sequence number of the delivering event.
#[derive(Default)]
struct Recorder {
    events: AtomicUsize,
}

#[async_trait]
impl PolicyBlock for Recorder {
    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        let seq = self.events.fetch_add(1, Ordering::SeqCst);
        let docs = match event.data {
            EventData::Users(users) => {
                let mut tick = PolicyDocument::new(event.user.did.clone(), json!({}));
                tick.option.insert("users".into(), json!(users));
                vec![tick]
            }
            data => data.into_documents(),
        };
        for mut doc in docs {
            doc.id = uuid::Uuid::new_v4().to_string();
            doc.policy_id = Some(ctx.policy_id().to_string());
            doc.tag = ctx.tag().map(str::to_string);
            doc.option.insert("event".into(), json!(seq));
            doc.option.insert("actor".into(), json!(event.user.did));
            ctx.services()
                .documents
                .save_document(doc)
                .await
                .map_err(|err| ctx.error(err.to_string()))?;
        }
        Ok(())
    }
}

fn recorder_factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::<Recorder>::default())
}

pub fn registry() -> BlockRegistry {
    let mut registry = pe_04_domain_blocks::registry();
    registry.register(BlockDescriptor::new(RECORDER, BlockRole::Terminal, recorder_factory));
    registry
}

/// A block with id `{tag}-id`, visible to every role.
pub fn block(block_type: &str, tag: &str) -> BlockConfig {
    BlockConfig::new(block_type)
        .with_id(format!("{tag}-id"))
        .with_tag(tag)
        .with_permissions(&["ANY_ROLE"])
}

pub fn recorder(tag: &str) -> BlockConfig {
    block(RECORDER, tag)
}

/// `mintDocumentBlock` for the fixture token, one token per ton.
pub fn mint(tag: &str) -> BlockConfig {
    block(pe_04_domain_blocks::blocks::mint::BLOCK_TYPE, tag)
        .with_option("tokenId", json!(TOKEN_ID))
        .with_option("rule", json!("tons"))
}

/// Explicit link from `source`'s `output` to `target`'s `RunEvent`.
pub fn link(source: &str, output: PolicyEventType, target: &str) -> EventConfig {
    EventConfig {
        source: source.into(),
        target: target.into(),
        output,
        input: PolicyEventType::RunEvent,
        actor: EventActor::EventInitiator,
        disabled: false,
    }
}

pub fn policy(children: Vec<BlockConfig>) -> PolicyConfig {
    let mut root = block(pe_04_domain_blocks::blocks::container::BLOCK_TYPE, "root");
    root.children = children;
    PolicyConfig {
        id: POLICY_ID.into(),
        name: "Integration policy".into(),
        owner: OWNER.into(),
        policy_roles: vec!["Installer".into(), "Verifier".into()],
        instance_topic_id: Some(INSTANCE_TOPIC.into()),
        status: PolicyStatus::Publish,
        discontinued_date: None,
        config: root,
    }
}

/// A monitoring report issued by `owner`, paying out to [`ACCOUNT`].
pub fn report(owner: &str, tons: f64) -> PolicyDocument {
    let mut doc = PolicyDocument::new(
        owner,
        json!({"issuer": owner, "credentialSubject": [{"tons": tons, "site": "north"}]}),
    );
    doc.hash = Some(format!("{owner}-{tons}-{}", uuid::Uuid::new_v4()));
    doc.accounts.insert("default".into(), ACCOUNT.into());
    doc
}

pub struct Env {
    pub engine: PolicyEngine,
    pub backend: InMemoryBackend,
    pub policy: PolicyConfig,
    events: Mutex<Subscription>,
}

impl Env {
    pub fn new(policy: PolicyConfig) -> Self {
        Self::with_backend(policy, InMemoryBackend::default())
    }

    pub fn with_backend(policy: PolicyConfig, backend: InMemoryBackend) -> Self {
        backend.tokens.add_token(TokenInfo {
            token_id: TOKEN_ID.into(),
            token_name: "Verified Carbon Unit".into(),
            token_symbol: "VCU".into(),
            token_type: TokenType::Fungible,
            decimals: 0,
            owner: Some(OWNER.into()),
        });
        let events = Mutex::new(backend.bus.subscribe(EventFilter::all()));
        Self {
            engine: PolicyEngine::new(registry(), backend.services()),
            backend,
            policy,
            events,
        }
    }

    /// Same policy with a dry-run transport session.
    pub fn dry_run(mut policy: PolicyConfig, session: &str) -> Self {
        policy.status = PolicyStatus::DryRun;
        Self::with_backend(policy, InMemoryBackend::new(TransportConfig::dry_run(session)))
    }

    pub async fn activate(&self) {
        let report = self.engine.activate(self.policy.clone()).await.unwrap();
        assert!(report.is_valid(), "{:?}", report.all_errors());
    }

    pub async fn run(&self, tag: &str, user: &PolicyUser, data: EventData) -> EngineResult<()> {
        self.engine
            .dispatch_event(&self.policy.id, tag, PolicyEventType::RunEvent, user, data)
            .await
    }

    pub fn balance(&self) -> u64 {
        self.backend.tokens.balance(TOKEN_ID, ACCOUNT)
    }

    /// Documents stored under `tag`, in insertion order.
    pub async fn stored(&self, tag: &str) -> Vec<PolicyDocument> {
        let filter = DocumentFilter {
            tag: Some(tag.into()),
            ..DocumentFilter::default()
        };
        self.backend
            .documents
            .find_documents(&self.policy.id, &filter)
            .await
            .unwrap()
    }

    /// Documents recorded under `tag`, grouped by delivering event.
    pub async fn batches(&self, tag: &str) -> Vec<Vec<PolicyDocument>> {
        let mut batches: Vec<Vec<PolicyDocument>> = Vec::new();
        for doc in self.stored(tag).await {
            let seq = doc.option["event"].as_u64().unwrap() as usize;
            if batches.len() <= seq {
                batches.resize_with(seq + 1, Vec::new);
            }
            batches[seq].push(doc);
        }
        batches
    }

    /// Block error messages published since the last call.
    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::BlockError { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

/// `tons` of every recorded document.
pub fn tons(docs: &[PolicyDocument]) -> Vec<Value> {
    docs.iter()
        .map(|doc| doc.subject_field("tons").cloned().unwrap_or(Value::Null))
        .collect()
}
