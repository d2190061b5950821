//! Engine fixtures shared by the block tests.

use crate::blocks;
use async_trait::async_trait;
use parking_lot::Mutex;
use pe_03_policy_engine::adapters::InMemoryBackend;
use pe_03_policy_engine::{
    validate_policy, BlockContext, BlockDescriptor, BlockRegistry, BlockResult, BlockRole,
    DocumentFilter, DocumentRepository, EngineResult, EventData, PolicyBlock, PolicyEngine, PolicyEngineApi,
    PolicyEvent,
};
use serde_json::json;
use shared_bus::{EngineEvent, EventFilter, Subscription};
use shared_types::{BlockConfig, PolicyConfig, PolicyDocument, PolicyEventType, PolicyStatus, PolicyUser};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const RECORDER: &str = "testRecorder";
pub const RELEASER: &str = "testReleaser";

/// Stores every document it runs on under its own tag. `option.event`
/// numbers the events received, `option.result` holds the id of the
/// event's result document. A timer tick is stored as an empty document
/// whose `option.users` lists the armed users.
#[derive(Default)]
pub struct Recorder {
    events: AtomicUsize,
}

#[async_trait]
impl PolicyBlock for Recorder {
    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        let seq = self.events.fetch_add(1, Ordering::SeqCst);
        let result = event.result.as_ref().map(|doc| doc.id.clone());
        let docs = match event.data {
            EventData::Users(users) => {
                let mut tick = PolicyDocument::new(event.user.did.clone(), json!({}));
                tick.option.insert("users".into(), json!(users));
                vec![tick]
            }
            data => data.into_documents(),
        };
        for mut doc in docs {
            doc.option.insert("source".into(), json!(doc.id));
            doc.id = uuid::Uuid::new_v4().to_string();
            doc.policy_id = Some(ctx.policy_id().to_string());
            doc.tag = ctx.tag().map(str::to_string);
            doc.option.insert("event".into(), json!(seq));
            doc.option.insert("actor".into(), json!(event.user.did));
            if let Some(result) = &result {
                doc.option.insert("result".into(), json!(result));
            }
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

/// Fires `ReleaseEvent` whenever it runs.
pub struct Releaser;

#[async_trait]
impl PolicyBlock for Releaser {
    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        ctx.trigger(PolicyEventType::ReleaseEvent, &event.user, EventData::Empty)
            .await;
        Ok(())
    }
}

fn releaser_factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::new(Releaser))
}

pub fn registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    blocks::register_all(&mut registry);
    registry
        .register(BlockDescriptor::new(RECORDER, BlockRole::Terminal, recorder_factory))
        .register(BlockDescriptor::new(RELEASER, BlockRole::Terminal, releaser_factory));
    registry
}

pub fn recorder(tag: &str) -> BlockConfig {
    block(RECORDER, tag)
}

pub fn releaser(tag: &str) -> BlockConfig {
    block(RELEASER, tag).with_option("stopPropagation", json!(true))
}

/// A block with id `{tag}-id`, visible to everyone.
pub fn block(block_type: &str, tag: &str) -> BlockConfig {
    BlockConfig::new(block_type)
        .with_id(format!("{tag}-id"))
        .with_tag(tag)
        .with_permissions(&["ANY_ROLE"])
}

pub fn policy(children: Vec<BlockConfig>) -> PolicyConfig {
    let mut root = block(blocks::container::BLOCK_TYPE, "root");
    root.children = children;
    PolicyConfig {
        id: "p1".into(),
        name: "Test policy".into(),
        owner: "did:owner".into(),
        policy_roles: vec!["Installer".into(), "Auditor".into()],
        instance_topic_id: Some("0.0.100".into()),
        status: PolicyStatus::Publish,
        discontinued_date: None,
        config: root,
    }
}

pub struct TestEnv {
    pub engine: PolicyEngine,
    pub backend: InMemoryBackend,
    pub policy: PolicyConfig,
    events: Mutex<Subscription>,
}

impl TestEnv {
    pub async fn activate(&self) {
        self.engine.activate(self.policy.clone()).await.unwrap();
    }

    /// Deliver a `RunEvent` to the block tagged `tag`.
    pub async fn run(&self, tag: &str, user: &PolicyUser, data: EventData) -> EngineResult<()> {
        self.dispatch(tag, PolicyEventType::RunEvent, user, data).await
    }

    pub async fn dispatch(
        &self,
        tag: &str,
        input: PolicyEventType,
        user: &PolicyUser,
        data: EventData,
    ) -> EngineResult<()> {
        self.engine
            .dispatch_event(&self.policy.id, tag, input, user, data)
            .await
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

pub fn engine_with(policy: PolicyConfig) -> TestEnv {
    let backend = InMemoryBackend::default();
    let events = Mutex::new(backend.bus.subscribe(EventFilter::all()));
    TestEnv {
        engine: PolicyEngine::new(registry(), backend.services()),
        backend,
        policy,
        events,
    }
}

/// Documents stored under `tag`, in insertion order.
pub async fn stored(env: &TestEnv, tag: &str) -> Vec<PolicyDocument> {
    let filter = DocumentFilter {
        tag: Some(tag.into()),
        ..DocumentFilter::default()
    };
    env.backend
        .documents
        .find_documents(&env.policy.id, &filter)
        .await
        .unwrap()
}

/// Recorded documents grouped by the event that delivered them.
pub async fn recorded_batches(env: &TestEnv, tag: &str) -> Vec<Vec<PolicyDocument>> {
    let mut batches: Vec<Vec<PolicyDocument>> = Vec::new();
    for doc in stored(env, tag).await {
        let seq = doc.option["event"].as_u64().unwrap() as usize;
        if batches.len() <= seq {
            batches.resize_with(seq + 1, Vec::new);
        }
        batches[seq].push(doc);
    }
    batches
}

/// Type-specific validation errors of a single block placed under the root.
pub fn validate_single(config: BlockConfig) -> Vec<String> {
    let report = validate_policy(&policy(vec![config]), &registry());
    report.blocks[1].errors.clone()
}

/// A credential document owned by `owner` with one subject.
pub fn vc(owner: &str, subject: serde_json::Value) -> PolicyDocument {
    PolicyDocument::new(
        owner,
        json!({"issuer": owner, "credentialSubject": [subject]}),
    )
}
