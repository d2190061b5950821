//! `filtersAddon`: a per-user field filter applied to the enclosing source.

use super::common::{option_bool, option_str};
use async_trait::async_trait;
use parking_lot::Mutex;
use pe_03_policy_engine::{BlockContext, BlockResult, BlockValidator, EngineResult, PolicyBlock};
use serde_json::{json, Map, Value};
use shared_types::{BlockConfig, PolicyUser};
use std::collections::BTreeMap;

pub const BLOCK_TYPE: &str = "filtersAddon";

pub fn validate(v: &mut BlockValidator<'_>) {
    if v.config().option_str("field").is_none() {
        v.add_error("Option \"field\" is not set");
    }
}

pub struct FiltersAddon {
    field: String,
    can_be_empty: bool,
    values: Mutex<BTreeMap<String, Value>>,
}

pub fn factory(config: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::new(FiltersAddon {
        field: option_str(&config.options, "field").unwrap_or_default().to_string(),
        can_be_empty: option_bool(&config.options, "canBeEmpty"),
        values: Mutex::new(BTreeMap::new()),
    }))
}

#[async_trait]
impl PolicyBlock for FiltersAddon {
    fn filters(&self, user: &PolicyUser) -> Map<String, Value> {
        let mut filters = Map::new();
        match self.values.lock().get(&user.did) {
            Some(value) => {
                filters.insert(self.field.clone(), value.clone());
            }
            // without a choice nothing matches unless empty is allowed
            None if !self.can_be_empty => {
                filters.insert(self.field.clone(), Value::from(""));
            }
            None => {}
        }
        filters
    }

    async fn get_data(&self, ctx: &BlockContext<'_>, user: &PolicyUser) -> BlockResult<Value> {
        Ok(json!({
            "id": ctx.block_id(),
            "blockType": BLOCK_TYPE,
            "field": self.field,
            "filterValue": self.values.lock().get(&user.did).cloned(),
        }))
    }

    /// `{"filterValue": ...}` sets the user's filter, `null` clears it.
    async fn set_data(
        &self,
        ctx: &BlockContext<'_>,
        user: &PolicyUser,
        data: Value,
    ) -> BlockResult<Value> {
        match data.get("filterValue").cloned().unwrap_or(Value::Null) {
            Value::Null => self.values.lock().remove(&user.did),
            value => self.values.lock().insert(user.did.clone(), value),
        };
        if let Some(parent) = ctx.parent() {
            parent.update_block(user).await;
        }
        Ok(Value::Null)
    }
}
