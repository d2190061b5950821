//! # Policy Tree
//!
//! Arena of live blocks built from a policy config. Nodes refer to each
//! other by index: the parent is an index, children are an owned index
//! list, links hold source and target indices.
//!
//! ```text
//!            ┌──────────────── nodes: Vec<BlockNode> ───────────────┐
//!            │ [0] root ──children──► [1] step ──children──► [2] .. │
//!            │      ▲                    │ parent                   │
//!            │      └────────────────────┘                          │
//!            └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. `build`: pre-order construction through the registry.
//! 2. `register_links`: default, configured and implicit links.
//! 3. `after_init`: restore persisted state of every block.
//! 4. `start`: start hooks (schedules).
//! 5. `destroy`: stop schedules, clear links, destroy behaviors.

use crate::context::BlockContext;
use crate::domain::{has_permission, BlockRole, EventLink, PolicyBlock};
use crate::error::{EngineResult, PolicyEngineError};
use crate::ports::{BlockRef, PolicyServices};
use crate::registry::BlockRegistry;
use crate::validation::{validate_policy, ValidationReport};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use shared_types::{BlockConfig, EventConfig, PolicyConfig, PolicyUser};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One live block: identity, structure and the boxed behavior.
pub struct BlockNode {
    pub(crate) uuid: String,
    pub(crate) block_type: String,
    pub(crate) tag: Option<String>,
    pub(crate) permissions: Vec<String>,
    pub(crate) default_active: bool,
    pub(crate) dependencies: Vec<String>,
    pub(crate) options: Map<String, Value>,
    pub(crate) events: Vec<EventConfig>,
    pub(crate) role: BlockRole,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    /// Links this block is the source of.
    pub(crate) links: RwLock<Vec<EventLink>>,
    pub(crate) behavior: Box<dyn PolicyBlock>,
}

impl BlockNode {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn default_active(&self) -> bool {
        self.default_active
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn role(&self) -> BlockRole {
        self.role
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn behavior(&self) -> &dyn PolicyBlock {
        self.behavior.as_ref()
    }

    /// Snapshot of the outgoing links.
    pub fn links(&self) -> Vec<EventLink> {
        self.links.read().clone()
    }

    /// Add a link unless an equal one is already registered.
    pub(crate) fn add_link(&self, link: EventLink) -> bool {
        let mut links = self.links.write();
        if links.contains(&link) {
            return false;
        }
        links.push(link);
        true
    }

    pub(crate) fn option_bool(&self, key: &str) -> bool {
        self.options.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn block_ref(&self) -> BlockRef {
        BlockRef {
            id: self.uuid.clone(),
            tag: self.tag.clone(),
            block_type: self.block_type.clone(),
        }
    }
}

/// A live policy.
pub struct PolicyTree {
    pub(crate) policy: PolicyConfig,
    pub(crate) nodes: Vec<BlockNode>,
    tags: HashMap<String, usize>,
    ids: HashMap<String, usize>,
    pub(crate) services: PolicyServices,
    pub(crate) shutdown: watch::Sender<bool>,
}

impl PolicyTree {
    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Build the arena in pre-order. Blocks without an id get a fresh one,
    /// which is also written back into the stored config.
    pub fn build(
        policy: PolicyConfig,
        registry: &BlockRegistry,
        services: PolicyServices,
    ) -> EngineResult<Arc<Self>> {
        let mut policy = policy;
        let mut nodes = Vec::new();
        add_node(&mut policy.config, None, registry, &mut nodes)?;

        let mut tags = HashMap::new();
        let mut ids = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            ids.insert(node.uuid.clone(), index);
            if let Some(tag) = &node.tag {
                tags.entry(tag.clone()).or_insert(index);
            }
        }

        let (shutdown, _) = watch::channel(false);
        debug!(
            policy_id = %policy.id,
            blocks = nodes.len(),
            "[pe-03] Policy tree built"
        );
        Ok(Arc::new(Self {
            policy,
            nodes,
            tags,
            ids,
            services,
            shutdown,
        }))
    }

    /// Restore persisted state for every block.
    pub async fn after_init(self: &Arc<Self>) {
        for (index, node) in self.nodes.iter().enumerate() {
            let found = self
                .services
                .states
                .find_state(&self.policy.id, &node.uuid, None)
                .await;
            match found {
                Ok(Some(state)) => {
                    if let Err(err) = node.behavior.restore_state(state) {
                        warn!(
                            policy_id = %self.policy.id,
                            block = %node.uuid,
                            error = %err,
                            "[pe-03] Discarding unreadable block state"
                        );
                        node.behavior.on_empty_state();
                    }
                }
                Ok(None) => node.behavior.on_empty_state(),
                Err(err) => {
                    warn!(
                        policy_id = %self.policy.id,
                        block = %node.uuid,
                        error = %err,
                        "[pe-03] Failed to load block state"
                    );
                    node.behavior.on_empty_state();
                }
            }
            debug!(block = %node.uuid, index, "[pe-03] Block restored");
        }
    }

    /// Run start hooks in pre-order.
    pub async fn start(self: &Arc<Self>) {
        for index in 0..self.nodes.len() {
            let ctx = BlockContext::new(self, index);
            if let Err(err) = self.nodes[index].behavior.start(&ctx).await {
                warn!(
                    policy_id = %self.policy.id,
                    block = %self.nodes[index].uuid,
                    error = %err,
                    "[pe-03] Block failed to start"
                );
            }
        }
        info!(policy_id = %self.policy.id, "[pe-03] Policy tree started");
    }

    /// Stop schedules, then clear links and destroy behaviors from the root
    /// down.
    pub fn destroy(&self) {
        self.shutdown.send_replace(true);
        if !self.nodes.is_empty() {
            self.destroy_node(0);
        }
        info!(policy_id = %self.policy.id, "[pe-03] Policy tree destroyed");
    }

    fn destroy_node(&self, index: usize) {
        let node = &self.nodes[index];
        node.links.write().clear();
        node.behavior.destroy();
        for &child in &node.children {
            self.destroy_node(child);
        }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn policy_id(&self) -> &str {
        &self.policy.id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &BlockNode {
        &self.nodes[index]
    }

    pub fn index_by_tag(&self, tag: &str) -> Option<usize> {
        self.tags.get(tag).copied()
    }

    pub fn index_by_id(&self, id: &str) -> Option<usize> {
        self.ids.get(id).copied()
    }

    /// Resolve a block by id, then by tag.
    pub fn find(&self, block: &str) -> EngineResult<usize> {
        self.index_by_id(block)
            .or_else(|| self.index_by_tag(block))
            .ok_or_else(|| PolicyEngineError::BlockNotFound {
                block: block.to_string(),
            })
    }

    /// The block and its ancestors, innermost first.
    pub fn parents(&self, index: usize) -> Vec<BlockRef> {
        let mut chain = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            chain.push(self.nodes[i].block_ref());
            current = self.nodes[i].parent;
        }
        chain
    }

    pub fn tag_map(&self) -> BTreeMap<String, String> {
        self.tags
            .iter()
            .map(|(tag, &index)| (tag.clone(), self.nodes[index].uuid.clone()))
            .collect()
    }

    /// Validate the live tree's config.
    pub fn validate(&self, registry: &BlockRegistry) -> ValidationReport {
        validate_policy(&self.policy, registry)
    }

    pub fn is_discontinued(&self) -> bool {
        self.policy.is_discontinued(Utc::now())
    }

    // =========================================================================
    // AVAILABILITY
    // =========================================================================

    pub fn has_permission(&self, index: usize, user: &PolicyUser) -> bool {
        has_permission(
            &self.nodes[index].permissions,
            user.role.as_deref(),
            &user.did,
            &self.policy.owner,
        )
    }

    /// Active when the parent says so; the root is always active.
    pub fn is_active(self: &Arc<Self>, index: usize, user: &PolicyUser) -> bool {
        match self.nodes[index].parent {
            None => true,
            Some(parent) => {
                let ctx = BlockContext::new(self, parent);
                self.nodes[parent]
                    .behavior
                    .is_child_active(&ctx, index, user)
            }
        }
    }

    /// Active, permitted, and the parent is available too.
    pub fn is_available(self: &Arc<Self>, index: usize, user: &PolicyUser) -> bool {
        self.is_active(index, user)
            && self.has_permission(index, user)
            && self.nodes[index]
                .parent
                .map_or(true, |parent| self.is_available(parent, user))
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Persisted form of a subtree. Runtime ids only when asked for.
    pub fn serialize(&self, index: usize, with_uuid: bool) -> Value {
        let node = &self.nodes[index];
        let mut object = Map::new();
        object.insert("blockType".into(), json!(node.block_type));
        object.insert("defaultActive".into(), json!(node.default_active));
        object.insert("permissions".into(), json!(node.permissions));
        if with_uuid {
            object.insert("uuid".into(), json!(node.uuid));
        }
        if let Some(tag) = &node.tag {
            object.insert("tag".into(), json!(tag));
        }
        if !node.dependencies.is_empty() {
            object.insert("dependencies".into(), json!(node.dependencies));
        }
        if !node.children.is_empty() {
            let children: Vec<Value> = node
                .children
                .iter()
                .map(|&child| self.serialize(child, with_uuid))
                .collect();
            object.insert("children".into(), Value::Array(children));
        }
        Value::Object(object)
    }
}

fn add_node(
    config: &mut BlockConfig,
    parent: Option<usize>,
    registry: &BlockRegistry,
    nodes: &mut Vec<BlockNode>,
) -> EngineResult<usize> {
    let descriptor =
        registry
            .get(&config.block_type)
            .ok_or_else(|| PolicyEngineError::UnknownBlockType {
                block_type: config.block_type.clone(),
            })?;
    let uuid = config
        .id
        .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
        .clone();
    let behavior = (descriptor.factory)(&*config)?;

    let index = nodes.len();
    nodes.push(BlockNode {
        uuid,
        block_type: config.block_type.clone(),
        tag: config.tag.clone(),
        permissions: config.permissions.clone(),
        default_active: config.default_active,
        dependencies: config.dependencies.clone(),
        options: config.options.clone(),
        events: config.events.clone(),
        role: descriptor.role,
        parent,
        children: Vec::new(),
        links: RwLock::new(Vec::new()),
        behavior,
    });
    if let Some(parent) = parent {
        nodes[parent].children.push(index);
    }

    for child in &mut config.children {
        add_node(child, Some(index), registry, nodes)?;
    }
    Ok(index)
}
