//! `documentsSourceAddon`: the stored documents a source block lists.
//!
//! `dataType` picks credentials (`vc-documents`), presentations
//! (`vp-documents`) or nothing (`source`). Static `filters` entries narrow
//! the result by field (`eq`, `ne`, `in`), `onlyOwnDocuments` and
//! `onlyOwnByGroupDocuments` restrict it to the viewer, and the order comes
//! from the viewer's chosen sort, else `orderField`/`orderDirection`.

use super::common::{get_path, option_bool, option_str};
use async_trait::async_trait;
use parking_lot::Mutex;
use pe_03_policy_engine::{
    BlockContext, BlockResult, BlockValidator, DocumentFilter, EngineResult, PolicyBlock,
    SourceQuery,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use shared_types::{BlockConfig, PolicyDocument, PolicyUser};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const BLOCK_TYPE: &str = "documentsSourceAddon";

/// Option marking which addon produced a listed document.
pub const SOURCE_TAG: &str = "__sourceTag__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    VcDocuments,
    VpDocuments,
    Source,
}

impl DataType {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "vc-documents" => Ok(Self::VcDocuments),
            "vp-documents" => Ok(Self::VpDocuments),
            "source" => Ok(Self::Source),
            other => Err(format!("dataType \"{other}\" is unknown")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Equal,
    NotEqual,
    In,
}

impl FilterKind {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "eq" | "equal" => Ok(Self::Equal),
            "ne" | "not_equal" => Ok(Self::NotEqual),
            "in" => Ok(Self::In),
            other => Err(format!("Unknown filter type: {other}")),
        }
    }
}

/// One entry of the `filters` option.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub kind: FilterKind,
    pub value: Value,
}

impl FieldFilter {
    pub fn matches(&self, doc: &PolicyDocument) -> bool {
        let actual = field_value(doc, &self.field);
        let equals = |expected: &Value| actual.as_ref().is_some_and(|a| loose_eq(a, expected));
        match self.kind {
            FilterKind::Equal => equals(&self.value),
            FilterKind::NotEqual => !equals(&self.value),
            FilterKind::In => in_values(&self.value).iter().any(equals),
        }
    }
}

/// `in` accepts an array or a comma separated string.
fn in_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => s.split(',').map(|item| Value::from(item.trim())).collect(),
        other => vec![other.clone()],
    }
}

/// Equality that lets `"5"` match `5`.
fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::String(s), other) | (other, Value::String(s)) if !other.is_string() => {
            s == &other.to_string()
        }
        _ => false,
    }
}

/// Document attribute, credential subject field, workflow option, or a
/// path into the stored record.
pub fn field_value(doc: &PolicyDocument, field: &str) -> Option<Value> {
    match field {
        "id" => return Some(Value::from(doc.id.clone())),
        "owner" => return Some(Value::from(doc.owner.clone())),
        "group" => return doc.group.clone().map(Value::from),
        "tag" => return doc.tag.clone().map(Value::from),
        _ => {}
    }
    if let Some(value) = doc.subject_field(field) {
        return Some(value.clone());
    }
    if let Some(value) = doc.option.get(field) {
        return Some(value.clone());
    }
    let record = serde_json::to_value(doc).ok()?;
    get_path(&record, field).cloned()
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Parse the `filters` option.
pub fn parse_filters(options: &Map<String, Value>) -> Result<Vec<FieldFilter>, String> {
    let raw = match options.get("filters") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err("filters option must be an array".into()),
    };
    raw.iter()
        .map(|item| {
            let kind = item.get("type").and_then(Value::as_str).unwrap_or_default();
            Ok(FieldFilter {
                field: item
                    .get("field")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                kind: FilterKind::parse(kind)?,
                value: item.get("value").cloned().unwrap_or(Value::Null),
            })
        })
        .collect()
}

pub fn validate(v: &mut BlockValidator<'_>) {
    let options = &v.config().options;
    let errors: Vec<String> = [
        DataType::parse(option_str(options, "dataType").unwrap_or_default()).err(),
        parse_filters(options).err(),
    ]
    .into_iter()
    .flatten()
    .collect();
    for error in errors {
        v.add_error(error);
    }
}

/// A viewer's chosen sort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SortState {
    #[serde(default)]
    order_field: Option<String>,
    #[serde(default)]
    order_direction: Option<String>,
}

#[derive(Default)]
pub struct DocumentsSourceAddon {
    sorting: Mutex<BTreeMap<String, SortState>>,
}

pub fn factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::<DocumentsSourceAddon>::default())
}

impl DocumentsSourceAddon {
    fn sort(&self, ctx: &BlockContext<'_>, user: &PolicyUser, docs: &mut [PolicyDocument]) {
        let chosen = self.sorting.lock().get(&user.did).cloned().unwrap_or_default();
        let (field, direction) = match chosen.order_direction {
            Some(direction) => (chosen.order_field, direction),
            None => match option_str(ctx.options(), "orderDirection") {
                Some(direction) => (
                    option_str(ctx.options(), "orderField").map(str::to_string),
                    direction.to_string(),
                ),
                None => return,
            },
        };
        if let Some(field) = field {
            docs.sort_by(|a, b| {
                compare_values(field_value(a, &field).as_ref(), field_value(b, &field).as_ref())
            });
        }
        if direction.eq_ignore_ascii_case("desc") {
            docs.reverse();
        }
    }
}

#[async_trait]
impl PolicyBlock for DocumentsSourceAddon {
    async fn get_sources(
        &self,
        ctx: &BlockContext<'_>,
        user: &PolicyUser,
        query: &SourceQuery,
    ) -> BlockResult<Vec<PolicyDocument>> {
        let options = ctx.options();
        let data_type = DataType::parse(option_str(options, "dataType").unwrap_or_default())
            .map_err(|err| ctx.error(err))?;
        let filters = parse_filters(options).map_err(|err| ctx.error(err))?;
        if data_type == DataType::Source {
            return Ok(Vec::new());
        }

        let mut filter = DocumentFilter {
            fields: query.filters.clone(),
            ..DocumentFilter::default()
        };
        if option_bool(options, "onlyOwnDocuments") {
            filter.owner = Some(user.did.clone());
        }
        if option_bool(options, "onlyOwnByGroupDocuments") {
            filter.group = user.group.clone();
        }
        let found = ctx
            .services()
            .documents
            .find_documents(ctx.policy_id(), &filter)
            .await
            .map_err(|err| ctx.error(err.to_string()))?;

        let want_vp = data_type == DataType::VpDocuments;
        let mut docs: Vec<PolicyDocument> = found
            .into_iter()
            .filter(|doc| doc.document.get("verifiableCredential").is_some() == want_vp)
            .filter(|doc| filters.iter().all(|f| f.matches(doc)))
            .collect();
        self.sort(ctx, user, &mut docs);
        for doc in &mut docs {
            doc.option.insert(SOURCE_TAG.into(), json!(ctx.tag()));
        }
        Ok(docs)
    }

    async fn get_data(&self, ctx: &BlockContext<'_>, user: &PolicyUser) -> BlockResult<Value> {
        let chosen = self.sorting.lock().get(&user.did).cloned().unwrap_or_default();
        Ok(json!({
            "id": ctx.block_id(),
            "blockType": BLOCK_TYPE,
            "orderField": chosen.order_field,
            "orderDirection": chosen.order_direction,
        }))
    }

    /// Store the viewer's sort and re-render the enclosing source.
    async fn set_data(
        &self,
        ctx: &BlockContext<'_>,
        user: &PolicyUser,
        data: Value,
    ) -> BlockResult<Value> {
        let sort: SortState =
            serde_json::from_value(data).map_err(|err| ctx.error(err.to_string()))?;
        self.sorting.lock().insert(user.did.clone(), sort);
        if let Some(parent) = ctx.parent() {
            parent.update_block(user).await;
        }
        Ok(Value::Null)
    }
}
