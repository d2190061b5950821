//! `interfaceContainerBlock`: groups children and lists the ones a user
//! can see.

use async_trait::async_trait;
use pe_03_policy_engine::{BlockContext, BlockResult, EngineResult, PolicyBlock};
use serde_json::{json, Value};
use shared_types::{BlockConfig, PolicyUser};

pub const BLOCK_TYPE: &str = "interfaceContainerBlock";

pub struct ContainerBlock;

pub fn factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::new(ContainerBlock))
}

#[async_trait]
impl PolicyBlock for ContainerBlock {
    async fn get_data(&self, ctx: &BlockContext<'_>, user: &PolicyUser) -> BlockResult<Value> {
        Ok(json!({
            "id": ctx.block_id(),
            "blockType": BLOCK_TYPE,
            "uiMetaData": ctx.options().get("uiMetaData").cloned().unwrap_or(Value::Null),
            "blocks": ctx.child_descriptors(user),
        }))
    }
}
