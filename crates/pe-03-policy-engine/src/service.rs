//! Policy engine service: owns the live trees and implements
//! [`PolicyEngineApi`].

use crate::context::BlockContext;
use crate::domain::{EventData, PolicyEvent};
use crate::error::{EngineResult, PolicyEngineError};
use crate::ports::{BlockRef, PolicyEngineApi, PolicyServices};
use crate::registry::BlockRegistry;
use crate::tree::PolicyTree;
use crate::validation::{validate_policy, ValidationReport};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use shared_bus::EngineEvent;
use shared_types::{PolicyConfig, PolicyEventType, PolicyUser};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Runs policy trees, one per active policy.
pub struct PolicyEngine {
    registry: Arc<BlockRegistry>,
    services: PolicyServices,
    trees: RwLock<HashMap<String, Arc<PolicyTree>>>,
}

impl PolicyEngine {
    pub fn new(registry: BlockRegistry, services: PolicyServices) -> Self {
        Self {
            registry: Arc::new(registry),
            services,
            trees: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn services(&self) -> &PolicyServices {
        &self.services
    }

    /// Live tree of an active policy.
    pub fn tree(&self, policy_id: &str) -> EngineResult<Arc<PolicyTree>> {
        self.trees
            .read()
            .get(policy_id)
            .cloned()
            .ok_or_else(|| PolicyEngineError::UnexistingPolicy {
                policy_id: policy_id.to_string(),
            })
    }

    pub fn active_policies(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.trees.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Destroy every live tree.
    pub async fn shutdown(&self) {
        for policy_id in self.active_policies() {
            if let Err(err) = self.deactivate(&policy_id).await {
                warn!(policy_id = %policy_id, error = %err, "[pe-03] Deactivation failed");
            }
        }
    }

    fn resolve(&self, policy_id: &str, block: &str) -> EngineResult<(Arc<PolicyTree>, usize)> {
        let tree = self.tree(policy_id)?;
        let index = tree.find(block)?;
        Ok((tree, index))
    }

    fn require_available(
        &self,
        policy_id: &str,
        block: &str,
        user: &PolicyUser,
    ) -> EngineResult<(Arc<PolicyTree>, usize)> {
        let (tree, index) = self.resolve(policy_id, block)?;
        if !tree.is_available(index, user) {
            return Err(PolicyEngineError::BlockUnavailable {
                block: block.to_string(),
            });
        }
        Ok((tree, index))
    }
}

#[async_trait]
impl PolicyEngineApi for PolicyEngine {
    fn validate(&self, policy: &PolicyConfig) -> ValidationReport {
        validate_policy(policy, &self.registry)
    }

    async fn activate(&self, policy: PolicyConfig) -> EngineResult<ValidationReport> {
        let report = self.validate(&policy);
        if !report.is_valid() {
            warn!(
                policy_id = %policy.id,
                invalid_blocks = report.invalid_blocks(),
                "[pe-03] Policy rejected by validation"
            );
            return Err(PolicyEngineError::Invalid(report));
        }

        let policy_id = policy.id.clone();
        let previous = self.trees.write().remove(&policy_id);
        if let Some(previous) = previous {
            info!(policy_id = %policy_id, "[pe-03] Reloading active policy");
            previous.destroy();
        }

        let tree = PolicyTree::build(policy, &self.registry, self.services.clone())?;
        tree.register_links();
        tree.after_init().await;
        tree.start().await;
        self.trees.write().insert(policy_id.clone(), tree);

        self.services
            .notifier
            .publish(EngineEvent::PolicyActivated {
                policy_id: policy_id.clone(),
            })
            .await;
        info!(policy_id = %policy_id, "[pe-03] Policy activated");
        Ok(report)
    }

    async fn deactivate(&self, policy_id: &str) -> EngineResult<()> {
        let tree = self.trees.write().remove(policy_id).ok_or_else(|| {
            PolicyEngineError::UnexistingPolicy {
                policy_id: policy_id.to_string(),
            }
        })?;
        tree.destroy();
        self.services
            .notifier
            .publish(EngineEvent::PolicyDeactivated {
                policy_id: policy_id.to_string(),
            })
            .await;
        info!(policy_id, "[pe-03] Policy deactivated");
        Ok(())
    }

    fn is_active(&self, policy_id: &str) -> bool {
        self.trees.read().contains_key(policy_id)
    }

    async fn get_block_data(
        &self,
        policy_id: &str,
        block: &str,
        user: &PolicyUser,
    ) -> EngineResult<Value> {
        let (tree, index) = self.require_available(policy_id, block, user)?;
        let ctx = BlockContext::new(&tree, index);
        Ok(tree.node(index).behavior().get_data(&ctx, user).await?)
    }

    async fn set_block_data(
        &self,
        policy_id: &str,
        block: &str,
        user: &PolicyUser,
        data: Value,
    ) -> EngineResult<Value> {
        let (tree, index) = self.require_available(policy_id, block, user)?;
        let ctx = BlockContext::new(&tree, index);
        Ok(tree.node(index).behavior().set_data(&ctx, user, data).await?)
    }

    async fn get_block_by_tag(&self, policy_id: &str, tag: &str) -> EngineResult<String> {
        let tree = self.tree(policy_id)?;
        let index = tree
            .index_by_tag(tag)
            .ok_or_else(|| PolicyEngineError::BlockNotFound {
                block: tag.to_string(),
            })?;
        Ok(tree.node(index).uuid().to_string())
    }

    async fn get_block_parents(&self, policy_id: &str, block: &str) -> EngineResult<Vec<BlockRef>> {
        let (tree, index) = self.resolve(policy_id, block)?;
        Ok(tree.parents(index))
    }

    async fn get_tag_block_map(&self, policy_id: &str) -> EngineResult<BTreeMap<String, String>> {
        Ok(self.tree(policy_id)?.tag_map())
    }

    async fn dispatch_event(
        &self,
        policy_id: &str,
        block: &str,
        input: PolicyEventType,
        user: &PolicyUser,
        data: EventData,
    ) -> EngineResult<()> {
        let (tree, index) = self.resolve(policy_id, block)?;
        let node = tree.node(index);
        if !node.behavior().accepts(&input) {
            warn!(policy_id, block, input = %input, "[pe-03] Event not handled by block");
            return Ok(());
        }
        let event = PolicyEvent {
            output: input.clone(),
            input,
            policy_id: policy_id.to_string(),
            source: node.uuid().to_string(),
            target: node.uuid().to_string(),
            user: user.clone(),
            data,
            result: None,
        };
        Ok(tree.dispatch(index, event).await?)
    }
}
