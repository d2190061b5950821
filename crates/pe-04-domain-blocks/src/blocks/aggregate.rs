//! `aggregateDocumentBlock`: buffer documents and release them in groups.
//!
//! Documents received on `RunEvent` are buffered. In `cumulative` mode every
//! arrival re-evaluates `condition` over the arrival's group and releases
//! the group once it holds. In `period` mode groups are released on
//! `TimerEvent`, for the users the timer carries. `PopEvent` drops
//! documents from the buffer.
//!
//! A group is the document owner (unless `disableUserGrouping`) plus the
//! values found at each `groupByFields` path of the stored document.

use super::common::{document_key, get_path};
use crate::formula::{self, document_scope, merge_scopes, FormulaValue, Scope};
use async_trait::async_trait;
use parking_lot::Mutex;
use pe_03_policy_engine::{
    BlockContext, BlockResult, BlockValidator, EngineResult, EventData, PolicyBlock,
    PolicyEngineError, PolicyEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{BlockConfig, PolicyDocument, PolicyEventType, PolicyUser};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

pub const BLOCK_TYPE: &str = "aggregateDocumentBlock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AggregateType {
    #[default]
    Period,
    Cumulative,
}

/// Named value computed per document for the condition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Expression {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupByField {
    field_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AggregateOptions {
    #[serde(default)]
    aggregate_type: AggregateType,
    #[serde(default)]
    expressions: Vec<Expression>,
    #[serde(default)]
    condition: String,
    #[serde(default)]
    group_by_fields: Vec<GroupByField>,
    #[serde(default)]
    disable_user_grouping: bool,
    #[serde(default)]
    empty_data: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AggregateState {
    documents: Vec<PolicyDocument>,
}

pub struct AggregateBlock {
    options: AggregateOptions,
    buffer: Mutex<Vec<PolicyDocument>>,
}

fn parse_options(config: &BlockConfig) -> Result<AggregateOptions, serde_json::Error> {
    serde_json::from_value(Value::Object(config.options.clone()))
}

pub fn factory(config: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    let options = parse_options(config).map_err(|err| PolicyEngineError::InvalidBlockOptions {
        block_type: BLOCK_TYPE.to_string(),
        reason: err.to_string(),
    })?;
    Ok(Box::new(AggregateBlock {
        options,
        buffer: Mutex::new(Vec::new()),
    }))
}

pub fn validate(v: &mut BlockValidator<'_>) {
    let options = match parse_options(v.config()) {
        Ok(options) => options,
        Err(err) => {
            v.add_error(format!("Options are invalid: {err}"));
            return;
        }
    };
    for expression in &options.expressions {
        if let Err(err) = formula::Formula::parse(&expression.value) {
            v.add_error(format!("Incorrect formula in expression \"{}\": {err}", expression.name));
        }
    }
    if options.aggregate_type == AggregateType::Cumulative {
        if options.condition.trim().is_empty() {
            v.add_error("Option \"condition\" is not set");
        } else if let Err(err) = formula::Formula::parse(&options.condition) {
            v.add_error(format!("Incorrect formula in condition: {err}"));
        }
    }
}

impl AggregateBlock {
    pub fn buffered(&self) -> Vec<PolicyDocument> {
        self.buffer.lock().clone()
    }

    fn group_by_user(&self) -> bool {
        !self.options.disable_user_grouping
    }

    /// Values at the `groupByFields` paths of the stored document record.
    fn field_values(&self, doc: &PolicyDocument) -> Vec<Value> {
        if self.options.group_by_fields.is_empty() {
            return Vec::new();
        }
        let record = serde_json::to_value(doc).unwrap_or(Value::Null);
        self.options
            .group_by_fields
            .iter()
            .map(|field| get_path(&record, &field.field_path).cloned().unwrap_or(Value::Null))
            .collect()
    }

    fn same_group(&self, anchor: &PolicyDocument, fields: &[Value], doc: &PolicyDocument) -> bool {
        if self.group_by_user() {
            if doc.owner != anchor.owner {
                return false;
            }
            if anchor.group.is_some() && doc.group != anchor.group {
                return false;
            }
        }
        self.field_values(doc) == fields
    }

    /// Per-document expression values, merged column-wise.
    fn condition_scope(&self, ctx: &BlockContext<'_>, docs: &[PolicyDocument]) -> Scope {
        let scopes: Vec<Scope> = docs
            .iter()
            .map(|doc| {
                let scope = document_scope(doc);
                self.options
                    .expressions
                    .iter()
                    .map(|expression| {
                        let value = match formula::evaluate(&expression.value, &scope) {
                            Ok(value) => value.parse_float(),
                            Err(err) => {
                                warn!(
                                    block = %ctx.block_id(),
                                    expression = %expression.value,
                                    error = %err,
                                    "[pe-04] Aggregate expression failed"
                                );
                                f64::NAN
                            }
                        };
                        (expression.name.clone(), FormulaValue::Number(value))
                    })
                    .collect()
            })
            .collect();
        merge_scopes(&scopes)
    }

    /// Re-check the condition for the group `doc` belongs to and release the
    /// group when it holds.
    async fn tick_aggregate(&self, ctx: &BlockContext<'_>, doc: &PolicyDocument) -> BlockResult<()> {
        let fields = self.field_values(doc);
        let group: Vec<PolicyDocument> = self
            .buffer
            .lock()
            .iter()
            .filter(|candidate| self.same_group(doc, &fields, candidate))
            .cloned()
            .collect();

        let scope = self.condition_scope(ctx, &group);
        let release = match formula::evaluate(&self.options.condition, &scope) {
            Ok(result) => {
                debug!(
                    block = %ctx.block_id(),
                    owner = %doc.owner,
                    result = %result,
                    "[pe-04] Aggregate condition evaluated"
                );
                result == FormulaValue::Bool(true)
            }
            Err(err) => {
                warn!(
                    block = %ctx.block_id(),
                    owner = %doc.owner,
                    condition = %self.options.condition,
                    error = %err,
                    "[pe-04] Aggregate condition failed"
                );
                false
            }
        };
        if !release {
            return Ok(());
        }

        let keys: BTreeSet<String> = group.iter().map(document_key).collect();
        self.buffer
            .lock()
            .retain(|candidate| !keys.contains(&document_key(candidate)));
        info!(block = %ctx.block_id(), documents = group.len(), "[pe-04] Aggregate released");
        let owner = ctx.find_user(&doc.owner).await;
        self.release(ctx, &owner, group).await;
        Ok(())
    }

    /// Release buffered groups for the users a timer tick carries.
    async fn tick_cron(&self, ctx: &BlockContext<'_>, users: &[String]) {
        let group_by_user = self.group_by_user();
        let documents = std::mem::take(&mut *self.buffer.lock());

        let mut groups: BTreeMap<(String, String), Vec<PolicyDocument>> = BTreeMap::new();
        let mut dropped = 0usize;
        for doc in documents {
            if group_by_user && !users.contains(&doc.owner) {
                dropped += 1;
                continue;
            }
            let owner = if group_by_user { doc.owner.clone() } else { String::new() };
            let fields = serde_json::to_string(&self.field_values(&doc)).unwrap_or_default();
            groups.entry((owner, fields)).or_default().push(doc);
        }
        info!(
            block = %ctx.block_id(),
            users = users.len(),
            groups = groups.len(),
            dropped,
            "[pe-04] Aggregate tick"
        );

        if groups.is_empty() && self.options.empty_data {
            let owner = ctx.find_user(ctx.policy_owner()).await;
            self.release(ctx, &owner, Vec::new()).await;
        }
        for ((owner, _), docs) in groups {
            let did = if group_by_user { owner.as_str() } else { ctx.policy_owner() };
            let user = ctx.find_user(did).await;
            self.release(ctx, &user, docs).await;
        }
    }

    async fn release(&self, ctx: &BlockContext<'_>, user: &PolicyUser, docs: Vec<PolicyDocument>) {
        let data = EventData::Documents(docs);
        ctx.trigger(PolicyEventType::RunEvent, user, data.clone()).await;
        ctx.trigger(PolicyEventType::RefreshEvent, user, data).await;
    }
}

#[async_trait]
impl PolicyBlock for AggregateBlock {
    fn accepts(&self, input: &PolicyEventType) -> bool {
        matches!(
            input,
            PolicyEventType::RunEvent
                | PolicyEventType::RefreshEvent
                | PolicyEventType::PopEvent
                | PolicyEventType::TimerEvent
        )
    }

    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        for doc in event.data.into_documents() {
            self.buffer.lock().push(doc.clone());
            if self.options.aggregate_type == AggregateType::Cumulative {
                self.tick_aggregate(ctx, &doc).await?;
            }
        }
        ctx.save_state().await;
        Ok(())
    }

    async fn handle_event(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        match event.input {
            PolicyEventType::PopEvent => {
                let keys: BTreeSet<String> =
                    event.data.documents().into_iter().map(document_key).collect();
                self.buffer
                    .lock()
                    .retain(|doc| !keys.contains(&document_key(doc)));
            }
            PolicyEventType::TimerEvent => {
                if self.options.aggregate_type != AggregateType::Period {
                    return Ok(());
                }
                self.tick_cron(ctx, event.data.users()).await;
            }
            _ => return Ok(()),
        }
        ctx.save_state().await;
        Ok(())
    }

    fn save_state(&self) -> Option<Value> {
        let state = AggregateState {
            documents: self.buffer.lock().clone(),
        };
        serde_json::to_value(state).ok()
    }

    fn restore_state(&self, state: Value) -> Result<(), serde_json::Error> {
        let state: AggregateState = serde_json::from_value(state)?;
        *self.buffer.lock() = state.documents;
        Ok(())
    }
}
