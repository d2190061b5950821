//! `interfaceDocumentsSourceBlock`: lists documents pulled through its
//! addons and lets a user act on one of them.
//!
//! `set_data` with `{"tag": ..., "documentId": ...}` fires the output event
//! named by `tag` with the chosen document. A user may only have one such
//! action in flight.

use super::common::option_f64;
use async_trait::async_trait;
use parking_lot::Mutex;
use pe_03_policy_engine::{
    BlockContext, BlockResult, EngineResult, EventData, PolicyBlock, SourceQuery,
};
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::{BlockConfig, PolicyEventType, PolicyUser};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

pub const BLOCK_TYPE: &str = "interfaceDocumentsSourceBlock";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetDataRequest {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    document_id: Option<String>,
    #[serde(default)]
    page_index: Option<usize>,
}

/// Users with an action in flight; the slot is freed on drop.
pub struct InFlight<'a> {
    users: &'a Mutex<BTreeSet<String>>,
    did: String,
}

impl<'a> InFlight<'a> {
    pub fn acquire(users: &'a Mutex<BTreeSet<String>>, did: &str) -> Option<Self> {
        users.lock().insert(did.to_string()).then(|| Self {
            users,
            did: did.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.users.lock().remove(&self.did);
    }
}

#[derive(Default)]
pub struct DocumentsSourceBlock {
    in_flight: Mutex<BTreeSet<String>>,
    pages: Mutex<BTreeMap<String, usize>>,
}

pub fn factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::<DocumentsSourceBlock>::default())
}

impl DocumentsSourceBlock {
    fn query(&self, ctx: &BlockContext<'_>, user: &PolicyUser) -> SourceQuery {
        let page_size = option_f64(ctx.options(), "pageSize")
            .filter(|size| *size >= 1.0)
            .map(|size| size as usize);
        SourceQuery {
            page_index: page_size.map(|_| self.pages.lock().get(&user.did).copied().unwrap_or(0)),
            page_size,
            ..SourceQuery::default()
        }
    }

    async fn act(
        &self,
        ctx: &BlockContext<'_>,
        user: &PolicyUser,
        tag: String,
        document_id: &str,
    ) -> BlockResult<()> {
        let Some(_guard) = InFlight::acquire(&self.in_flight, &user.did) else {
            return Err(ctx.error("Already processing"));
        };
        let documents = ctx.collect_sources(user, &SourceQuery::default()).await?;
        let document = documents
            .into_iter()
            .find(|doc| doc.id == document_id)
            .ok_or_else(|| ctx.error("Document is not found."))?;
        info!(block = %ctx.block_id(), tag = %tag, document = %document_id, "[pe-04] Document action");
        ctx.trigger(PolicyEventType::Custom(tag), user, EventData::Document(document))
            .await;
        Ok(())
    }
}

#[async_trait]
impl PolicyBlock for DocumentsSourceBlock {
    async fn get_data(&self, ctx: &BlockContext<'_>, user: &PolicyUser) -> BlockResult<Value> {
        let query = self.query(ctx, user);
        let documents = ctx.collect_sources(user, &query).await?;
        let count = documents.len();
        let page: Vec<_> = match (query.page_index, query.page_size) {
            (Some(index), Some(size)) => documents
                .into_iter()
                .skip(index.saturating_mul(size))
                .take(size)
                .collect(),
            _ => documents,
        };
        let data = serde_json::to_value(page).map_err(|err| ctx.error(err.to_string()))?;
        Ok(json!({
            "id": ctx.block_id(),
            "blockType": BLOCK_TYPE,
            "data": data,
            "count": count,
            "pageIndex": query.page_index,
            "pageSize": query.page_size,
            "blocks": ctx.child_descriptors(user),
        }))
    }

    async fn set_data(
        &self,
        ctx: &BlockContext<'_>,
        user: &PolicyUser,
        data: Value,
    ) -> BlockResult<Value> {
        let request: SetDataRequest =
            serde_json::from_value(data).map_err(|err| ctx.error(err.to_string()))?;
        if let Some(index) = request.page_index {
            self.pages.lock().insert(user.did.clone(), index);
        }
        match (request.tag, request.document_id) {
            (Some(tag), Some(document_id)) => {
                self.act(ctx, user, tag, &document_id).await?;
                Ok(Value::Null)
            }
            _ => self.get_data(ctx, user).await,
        }
    }
}
