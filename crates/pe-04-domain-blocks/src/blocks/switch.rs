//! `switchBlock`: route documents by condition.
//!
//! Conditions are checked in configured order against the document's
//! credential subject (or, for a batch, the merged subjects). A satisfied
//! condition fires its own output event, named after the condition tag and
//! linked implicitly to the condition's target. `firstTrue` stops at the
//! first satisfied condition; `allTrue` fires every one.

use crate::formula::{self, document_scope, merge_scopes, Scope};
use async_trait::async_trait;
use pe_03_policy_engine::{
    BlockContext, BlockResult, BlockValidator, EngineResult, ImplicitLink, PolicyBlock,
    PolicyEngineError, PolicyEvent,
};
use serde::Deserialize;
use shared_types::{BlockConfig, EventActor, PolicyEventType};
use tracing::{debug, warn};

pub const BLOCK_TYPE: &str = "switchBlock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionFlow {
    #[default]
    FirstTrue,
    AllTrue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Equal,
    NotEqual,
    Unconditional,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Condition {
    /// Output event fired when the condition holds.
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: ConditionType,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub actor: EventActor,
    /// Tag of the block receiving the documents.
    #[serde(default)]
    pub target: String,
}

impl Condition {
    /// Whether the condition holds for `scope`. Formulas that fail to
    /// evaluate count as not satisfied.
    pub fn check(&self, scope: &Scope) -> bool {
        let holds = |value: &str| match formula::evaluate(value, scope) {
            Ok(result) => result.is_truthy(),
            Err(err) => {
                debug!(condition = %self.tag, error = %err, "[pe-04] Condition not evaluated");
                false
            }
        };
        match self.kind {
            ConditionType::Unconditional => true,
            ConditionType::Equal => holds(&self.value),
            ConditionType::NotEqual => !holds(&self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchOptions {
    #[serde(default)]
    execution_flow: ExecutionFlow,
    #[serde(default)]
    conditions: Vec<Condition>,
}

pub struct SwitchBlock {
    flow: ExecutionFlow,
    conditions: Vec<Condition>,
}

pub fn factory(config: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    let options: SwitchOptions = serde_json::from_value(serde_json::Value::Object(
        config.options.clone(),
    ))
    .map_err(|err| PolicyEngineError::InvalidBlockOptions {
        block_type: BLOCK_TYPE.to_string(),
        reason: err.to_string(),
    })?;
    Ok(Box::new(SwitchBlock {
        flow: options.execution_flow,
        conditions: options.conditions,
    }))
}

pub fn validate(v: &mut BlockValidator<'_>) {
    let config = v.config();
    let own_tag = v.tag();
    let Some(raw) = config.option("conditions") else {
        return;
    };
    let conditions: Vec<Condition> = match serde_json::from_value(raw.clone()) {
        Ok(conditions) => conditions,
        Err(err) => {
            v.add_error(format!("Option \"conditions\" is invalid: {err}"));
            return;
        }
    };
    for condition in &conditions {
        if condition.target.is_empty() {
            continue;
        }
        if !v.tag_exists(&condition.target) {
            v.add_error(format!("Tag \"{}\" does not exist", condition.target));
        }
        if own_tag == Some(condition.target.as_str()) {
            v.add_error(format!("Condition \"{}\" redirects to the switch itself", condition.tag));
        }
        if condition.kind != ConditionType::Unconditional {
            if let Err(err) = formula::Formula::parse(&condition.value) {
                v.add_error(format!("Incorrect formula in \"{}\": {err}", condition.tag));
            }
        }
    }
}

impl SwitchBlock {
    /// Conditions that fire for `scope`, honoring the execution flow.
    pub fn select(&self, scope: &Scope) -> Vec<&Condition> {
        let mut selected = Vec::new();
        for condition in &self.conditions {
            if condition.check(scope) {
                selected.push(condition);
                if self.flow == ExecutionFlow::FirstTrue {
                    break;
                }
            }
        }
        selected
    }
}

#[async_trait]
impl PolicyBlock for SwitchBlock {
    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        let docs = event.data.documents();
        let scope = match docs.as_slice() {
            [doc] => document_scope(doc),
            docs => merge_scopes(&docs.iter().map(|doc| document_scope(doc)).collect::<Vec<_>>()),
        };

        let selected = self.select(&scope);
        if selected.is_empty() {
            warn!(block = %ctx.block_id(), "[pe-04] No switch condition satisfied");
        }
        for condition in selected {
            debug!(block = %ctx.block_id(), condition = %condition.tag, "[pe-04] Switch condition fired");
            ctx.trigger(
                PolicyEventType::Custom(condition.tag.clone()),
                &event.user,
                event.data.clone(),
            )
            .await;
        }
        ctx.trigger(PolicyEventType::RefreshEvent, &event.user, event.data)
            .await;
        Ok(())
    }

    fn implicit_links(&self) -> Vec<ImplicitLink> {
        self.conditions
            .iter()
            .filter(|condition| !condition.target.is_empty())
            .map(|condition| ImplicitLink {
                output: PolicyEventType::Custom(condition.tag.clone()),
                input: PolicyEventType::RunEvent,
                target_tag: condition.target.clone(),
                actor: condition.actor,
            })
            .collect()
    }
}
