//! `interfaceStepBlock`: shows one child at a time per user.
//!
//! Reaching a child makes it the user's current step. A `ReleaseEvent`
//! from the last child, or from a child listed in `finalBlocks`, starts a
//! `cyclic` step block over at the first child.

use super::common::{option_array, option_bool};
use async_trait::async_trait;
use parking_lot::Mutex;
use pe_03_policy_engine::{
    BlockContext, BlockResult, BlockValidator, EngineResult, PolicyBlock, PolicyEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{BlockConfig, PolicyEventType, PolicyUser};
use std::collections::BTreeMap;
use tracing::debug;

pub const BLOCK_TYPE: &str = "interfaceStepBlock";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StepState {
    steps: BTreeMap<String, usize>,
}

#[derive(Default)]
pub struct StepBlock {
    steps: Mutex<BTreeMap<String, usize>>,
}

pub fn factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::<StepBlock>::default())
}

pub fn validate(v: &mut BlockValidator<'_>) {
    let tags: Vec<String> = option_array(&v.config().options, "finalBlocks")
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    for tag in tags {
        if !v.tag_exists(&tag) {
            v.add_error(format!("Tag \"{tag}\" does not exist"));
        }
    }
}

impl StepBlock {
    pub fn current(&self, did: &str) -> usize {
        self.steps.lock().get(did).copied().unwrap_or(0)
    }

    async fn set_step(&self, ctx: &BlockContext<'_>, user: &PolicyUser, position: usize) {
        let previous = self.steps.lock().insert(user.did.clone(), position);
        if previous != Some(position) {
            debug!(block = %ctx.block_id(), user = %user.did, position, "[pe-04] Step changed");
        }
        ctx.update_block(user).await;
    }

    /// Whether a release from the child at `position` ends the cycle.
    fn is_final(ctx: &BlockContext<'_>, position: usize) -> bool {
        let children = ctx.children();
        if position + 1 == children.len() {
            return true;
        }
        let Some(tag) = children.get(position).and_then(BlockContext::tag) else {
            return false;
        };
        option_array(ctx.options(), "finalBlocks")
            .iter()
            .any(|final_tag| final_tag.as_str() == Some(tag))
    }
}

#[async_trait]
impl PolicyBlock for StepBlock {
    fn accepts(&self, input: &PolicyEventType) -> bool {
        matches!(
            input,
            PolicyEventType::RunEvent | PolicyEventType::RefreshEvent | PolicyEventType::ReleaseEvent
        )
    }

    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        self.set_step(ctx, &event.user, 0).await;
        Ok(())
    }

    async fn handle_event(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        if event.input != PolicyEventType::ReleaseEvent || !option_bool(ctx.options(), "cyclic") {
            return Ok(());
        }
        let Some(position) = ctx.child_position_by_id(&event.source) else {
            return Ok(());
        };
        if Self::is_final(ctx, position) {
            self.set_step(ctx, &event.user, 0).await;
        }
        Ok(())
    }

    async fn get_data(&self, ctx: &BlockContext<'_>, user: &PolicyUser) -> BlockResult<Value> {
        Ok(json!({
            "id": ctx.block_id(),
            "blockType": BLOCK_TYPE,
            "index": self.current(&user.did),
            "blocks": ctx.child_descriptors(user),
        }))
    }

    fn is_child_active(&self, ctx: &BlockContext<'_>, child: usize, user: &PolicyUser) -> bool {
        ctx.child_position(child) == Some(self.current(&user.did))
    }

    async fn change_step(
        &self,
        ctx: &BlockContext<'_>,
        user: &PolicyUser,
        child: usize,
    ) -> BlockResult<()> {
        if let Some(position) = ctx.child_position(child) {
            self.set_step(ctx, user, position).await;
        }
        Ok(())
    }

    fn save_state(&self) -> Option<Value> {
        let state = StepState {
            steps: self.steps.lock().clone(),
        };
        serde_json::to_value(state).ok()
    }

    fn restore_state(&self, state: Value) -> Result<(), serde_json::Error> {
        let state: StepState = serde_json::from_value(state)?;
        *self.steps.lock() = state.steps;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{block, engine_with, policy, recorder, releaser, validate_single, TestEnv};
    use pe_03_policy_engine::{EventData, PolicyEngineApi};

    async fn visible(env: &TestEnv, user: &PolicyUser) -> (u64, Vec<String>) {
        let data = env.engine.get_block_data("p1", "steps", user).await.unwrap();
        let tags = data["blocks"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|child| child["tag"].as_str().map(str::to_string))
            .collect();
        (data["index"].as_u64().unwrap(), tags)
    }

    fn steps(cyclic: bool, children: Vec<BlockConfig>) -> BlockConfig {
        let mut config = block(BLOCK_TYPE, "steps").with_option("cyclic", json!(cyclic));
        config.children = children;
        config
    }

    #[tokio::test]
    async fn test_one_child_at_a_time() {
        let env = engine_with(policy(vec![steps(
            false,
            vec![recorder("first"), recorder("second").with_option("stopPropagation", json!(true))],
        )]));
        env.activate().await;
        let alice = PolicyUser::new("did:alice");
        let bob = PolicyUser::new("did:bob");

        assert_eq!(visible(&env, &alice).await, (0, vec!["first".to_string()]));
        env.run("second", &alice, EventData::Empty).await.unwrap();
        assert_eq!(visible(&env, &alice).await, (1, vec!["second".to_string()]));
        // steps are tracked per user
        assert_eq!(visible(&env, &bob).await.0, 0);

        let state = env.backend.states.get("p1", "steps-id").unwrap();
        assert_eq!(state["steps"]["did:alice"], json!(1));
    }

    #[tokio::test]
    async fn test_cyclic_release_from_last_child() {
        let env = engine_with(policy(vec![steps(true, vec![recorder("first"), releaser("last")])]));
        env.activate().await;
        let user = PolicyUser::new("did:alice");

        env.run("last", &user, EventData::Empty).await.unwrap();
        assert_eq!(visible(&env, &user).await.0, 0);
    }

    #[tokio::test]
    async fn test_release_without_cycle_keeps_step() {
        let env = engine_with(policy(vec![steps(false, vec![recorder("first"), releaser("last")])]));
        env.activate().await;
        let user = PolicyUser::new("did:alice");

        env.run("last", &user, EventData::Empty).await.unwrap();
        assert_eq!(visible(&env, &user).await.0, 1);
    }

    #[tokio::test]
    async fn test_final_blocks_end_cycle() {
        let config = steps(true, vec![recorder("first"), releaser("mid"), recorder("end")])
            .with_option("finalBlocks", json!(["mid"]));
        let env = engine_with(policy(vec![config]));
        env.activate().await;
        let user = PolicyUser::new("did:alice");

        env.run("mid", &user, EventData::Empty).await.unwrap();
        assert_eq!(visible(&env, &user).await.0, 0);
    }

    #[test]
    fn test_validator() {
        let config = BlockConfig::new(BLOCK_TYPE)
            .with_id("s")
            .with_option("finalBlocks", json!(["ghost"]));
        assert_eq!(validate_single(config), vec!["Tag \"ghost\" does not exist".to_string()]);
    }
}
