//! Driving port: what the API layer can ask of the engine.

use crate::domain::EventData;
use crate::error::EngineResult;
use crate::validation::ValidationReport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{PolicyConfig, PolicyEventType, PolicyUser};
use std::collections::BTreeMap;

/// A block identified by id, tag and type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub block_type: String,
}

/// Policy engine API.
///
/// Blocks are addressed by id or tag. Every per-policy call fails with
/// "Unexisting policy" when the policy is not active.
#[async_trait]
pub trait PolicyEngineApi: Send + Sync {
    /// Validate a policy without building it.
    fn validate(&self, policy: &PolicyConfig) -> ValidationReport;

    /// Validate, build, restore and start a policy tree. An active tree
    /// for the same policy is replaced.
    async fn activate(&self, policy: PolicyConfig) -> EngineResult<ValidationReport>;

    /// Destroy the live tree.
    async fn deactivate(&self, policy_id: &str) -> EngineResult<()>;

    fn is_active(&self, policy_id: &str) -> bool;

    async fn get_block_data(
        &self,
        policy_id: &str,
        block: &str,
        user: &PolicyUser,
    ) -> EngineResult<Value>;

    async fn set_block_data(
        &self,
        policy_id: &str,
        block: &str,
        user: &PolicyUser,
        data: Value,
    ) -> EngineResult<Value>;

    /// Block id for a tag.
    async fn get_block_by_tag(&self, policy_id: &str, tag: &str) -> EngineResult<String>;

    /// The block and its ancestors, innermost first.
    async fn get_block_parents(&self, policy_id: &str, block: &str) -> EngineResult<Vec<BlockRef>>;

    /// Tag to block id for every tagged block.
    async fn get_tag_block_map(&self, policy_id: &str) -> EngineResult<BTreeMap<String, String>>;

    /// Deliver an external event straight to a block.
    async fn dispatch_event(
        &self,
        policy_id: &str,
        block: &str,
        input: PolicyEventType,
        user: &PolicyUser,
        data: EventData,
    ) -> EngineResult<()>;
}
