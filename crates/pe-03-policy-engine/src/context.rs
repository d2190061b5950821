//! Handle a behavior receives on every call: the block it runs as, the
//! tree around it, and the injected services.

use crate::domain::{BlockRole, EventState, Schedule, SourceQuery};
use crate::ports::PolicyServices;
use crate::tree::{BlockNode, PolicyTree};
use chrono::Utc;
use serde_json::{json, Map, Value};
use shared_types::{BlockActionError, PolicyConfig, PolicyDocument, PolicyEventType, PolicyUser};
use std::sync::Arc;
use tracing::{debug, warn};

/// A block's view of its tree.
#[derive(Clone, Copy)]
pub struct BlockContext<'a> {
    tree: &'a Arc<PolicyTree>,
    index: usize,
}

impl<'a> BlockContext<'a> {
    pub fn new(tree: &'a Arc<PolicyTree>, index: usize) -> Self {
        Self { tree, index }
    }

    // ===== Identity =====

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tree(&self) -> &'a Arc<PolicyTree> {
        self.tree
    }

    pub fn node(&self) -> &'a BlockNode {
        self.tree.node(self.index)
    }

    pub fn block_id(&self) -> &'a str {
        self.node().uuid()
    }

    pub fn block_type(&self) -> &'a str {
        self.node().block_type()
    }

    pub fn tag(&self) -> Option<&'a str> {
        self.node().tag()
    }

    pub fn options(&self) -> &'a Map<String, Value> {
        self.node().options()
    }

    pub fn policy(&self) -> &'a PolicyConfig {
        self.tree.policy()
    }

    pub fn policy_id(&self) -> &'a str {
        self.tree.policy_id()
    }

    pub fn policy_owner(&self) -> &'a str {
        &self.tree.policy().owner
    }

    pub fn is_dry_run(&self) -> bool {
        self.tree.policy().is_dry_run()
    }

    pub fn services(&self) -> &'a PolicyServices {
        &self.tree.services
    }

    /// A block action error attributed to this block.
    pub fn error(&self, message: impl Into<String>) -> BlockActionError {
        BlockActionError::new(message, self.block_type(), self.block_id())
    }

    // ===== Structure =====

    pub fn parent(&self) -> Option<BlockContext<'a>> {
        self.node()
            .parent()
            .map(|parent| BlockContext::new(self.tree, parent))
    }

    pub fn children(&self) -> Vec<BlockContext<'a>> {
        self.node()
            .children()
            .iter()
            .map(|&child| BlockContext::new(self.tree, child))
            .collect()
    }

    /// Position of `child` (an arena index) among this block's children.
    pub fn child_position(&self, child: usize) -> Option<usize> {
        self.node().children().iter().position(|&i| i == child)
    }

    /// Position of the child with block id `id`.
    pub fn child_position_by_id(&self, id: &str) -> Option<usize> {
        let index = self.tree.index_by_id(id)?;
        self.child_position(index)
    }

    pub fn has_permission(&self, user: &PolicyUser) -> bool {
        self.tree.has_permission(self.index, user)
    }

    pub fn is_available(&self, user: &PolicyUser) -> bool {
        self.tree.is_available(self.index, user)
    }

    // ===== Events =====

    /// Fire this block's links for `output`.
    pub async fn trigger(
        &self,
        output: PolicyEventType,
        user: &PolicyUser,
        state: impl Into<EventState>,
    ) {
        self.tree
            .trigger(self.index, &output, user, state.into())
            .await;
    }

    /// Save state and broadcast a re-render.
    pub async fn update_block(&self, user: &PolicyUser) {
        self.tree.update_block(self.index, user).await;
    }

    pub async fn save_state(&self) {
        self.tree.save_state(self.index).await;
    }

    /// Publish an error for this block without failing the caller.
    pub async fn report_error(&self, user: &PolicyUser, err: &BlockActionError) {
        self.tree.report_error(self.index, user, err).await;
    }

    /// Registered user for a DID.
    pub async fn find_user(&self, did: &str) -> PolicyUser {
        self.tree.find_user(did).await
    }

    // ===== Containers and sources =====

    /// Descriptors of the children `user` can see.
    pub fn child_descriptors(&self, user: &PolicyUser) -> Vec<Value> {
        self.children()
            .into_iter()
            .filter(|child| child.is_available(user))
            .map(|child| {
                let node = child.node();
                json!({
                    "id": node.uuid(),
                    "blockType": node.block_type(),
                    "tag": node.tag(),
                    "uiMetaData": node.options().get("uiMetaData").cloned().unwrap_or(Value::Null),
                })
            })
            .collect()
    }

    /// Pull documents through the addon children: filter addons narrow the
    /// query, then every other addon contributes its documents.
    pub async fn collect_sources(
        &self,
        user: &PolicyUser,
        query: &SourceQuery,
    ) -> Result<Vec<PolicyDocument>, BlockActionError> {
        let addons: Vec<_> = self
            .children()
            .into_iter()
            .filter(|child| child.node().role() == BlockRole::Addon)
            .collect();

        let mut query = query.clone();
        for addon in &addons {
            query.filters.extend(addon.node().behavior().filters(user));
        }

        let mut documents = Vec::new();
        for addon in &addons {
            let found = addon
                .node()
                .behavior()
                .get_sources(addon, user, &query)
                .await?;
            documents.extend(found);
        }
        Ok(documents)
    }

    // ===== Schedules =====

    /// Run `on_tick` on this block at every firing of `schedule` until the
    /// tree is destroyed or the schedule ends.
    pub fn spawn_schedule(&self, schedule: Schedule) {
        let now = Utc::now();
        if schedule.next_after(now).is_none() {
            debug!(block = %self.block_id(), "[pe-03] Schedule already ended");
            return;
        }
        let tree = Arc::clone(self.tree);
        let index = self.index;
        let mut shutdown = tree.shutdown.subscribe();

        tokio::spawn(async move {
            // firings are computed from the previous firing, not the clock
            let mut cursor = now;
            loop {
                let Some(next) = schedule.next_after(cursor) else {
                    debug!(block = %tree.node(index).uuid(), "[pe-03] Schedule ended");
                    break;
                };
                cursor = next;
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::select! {
                    () = tokio::time::sleep(wait) => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
                let ctx = BlockContext::new(&tree, index);
                if let Err(err) = tree.node(index).behavior().on_tick(&ctx).await {
                    warn!(
                        block = %tree.node(index).uuid(),
                        error = %err,
                        "[pe-03] Scheduled tick failed"
                    );
                }
            }
        });
    }
}
