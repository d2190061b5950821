//! `splitBlock`: cut documents into chunks worth exactly `threshold`.
//!
//! Each user has a residue: pieces that do not yet add up to a full chunk.
//! An incoming document first tops up the residue, then yields as many
//! full chunks as it can, and leaves its remainder as the new residue.
//!
//! ```text
//! threshold 40, documents 30, 50, 25
//!
//!   30 → residue [30]
//!   50 → residue [30, 10] closes, chunk [40]
//!   25 → residue [25]
//! ```
//!
//! Every piece is re-issued as a credential with the cut value written to
//! `sourceField`. Pieces of a published document carry a `SourceDocument`
//! evidence entry pointing back to it.

use super::common::{as_f64, get_path, number_value, option_f64, option_str, set_path, OrBlockError};
use async_trait::async_trait;
use parking_lot::Mutex;
use pe_03_policy_engine::{
    BlockContext, BlockResult, BlockValidator, EngineResult, EventData, PolicyBlock, PolicyEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{BlockConfig, PolicyDocument, PolicyEventType, PolicyUser};
use std::collections::BTreeMap;
use tracing::debug;

pub const BLOCK_TYPE: &str = "splitBlock";

pub fn factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::<SplitBlock>::default())
}

pub fn validate(v: &mut BlockValidator<'_>) {
    let config = v.config();
    match config.option("threshold").and_then(as_f64) {
        None => v.add_error("Option \"threshold\" is not set"),
        Some(threshold) if threshold <= 0.0 || !threshold.is_finite() => {
            v.add_error("Option \"threshold\" must be a positive number");
        }
        Some(_) => {}
    }
    if config.option_str("sourceField").is_none() {
        v.add_error("Option \"sourceField\" is not set");
    }
}

// ===== Planning =====

/// One cut of a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Piece {
    pub value: f64,
    /// 1-based position among the pieces of the source document.
    pub number: usize,
    pub of: usize,
}

/// Steps applied, in order, to the residue when a document arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Emit the residue as a chunk and start a new one.
    Close,
    /// Add a piece to the residue.
    Push(Piece),
    /// Emit a piece as a chunk of its own.
    Chunk(Piece),
}

/// Cut `value` against a residue already holding `residue_total`.
pub fn plan(residue_total: f64, threshold: f64, value: f64) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut needed = threshold - residue_total;
    if needed <= 0.0 {
        steps.push(Step::Close);
        needed = threshold;
    }
    if value < needed {
        steps.push(Step::Push(Piece {
            value,
            number: 1,
            of: 1,
        }));
        return steps;
    }

    let count = ((value - needed) / threshold).floor().max(0.0) as usize;
    let end = value - needed - count as f64 * threshold;
    let of = count + usize::from(end > 0.0) + 1;
    steps.push(Step::Push(Piece {
        value: needed,
        number: 1,
        of,
    }));
    steps.push(Step::Close);
    for i in 0..count {
        steps.push(Step::Chunk(Piece {
            value: threshold,
            number: i + 2,
            of,
        }));
    }
    if end > 0.0 {
        steps.push(Step::Push(Piece {
            value: end,
            number: of,
            of,
        }));
    }
    steps
}

// ===== Block =====

/// A piece waiting in a user's residue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Residue {
    pub value: f64,
    pub document: PolicyDocument,
}

#[derive(Default)]
pub struct SplitBlock {
    /// Residue per user DID.
    residue: Mutex<BTreeMap<String, Vec<Residue>>>,
}

#[derive(Serialize, Deserialize)]
struct SplitState {
    residue: BTreeMap<String, Vec<Residue>>,
}

impl SplitBlock {
    pub fn residue(&self, did: &str) -> Vec<Residue> {
        self.residue.lock().get(did).cloned().unwrap_or_default()
    }

    async fn piece_document(
        &self,
        ctx: &BlockContext<'_>,
        source: &PolicyDocument,
        field: &str,
        piece: Piece,
        source_value: f64,
        threshold: f64,
    ) -> BlockResult<PolicyDocument> {
        let mut record = serde_json::to_value(source).or_block(ctx)?;
        if !set_path(&mut record, field, number_value(piece.value)) {
            return Err(ctx.error(format!("Field {field} can not be set")));
        }
        let clone: PolicyDocument = serde_json::from_value(record).or_block(ctx)?;

        let subject = clone
            .credential_subject()
            .cloned()
            .map(Value::Object)
            .unwrap_or_else(|| json!({}));
        let evidence = source.message_id.as_ref().map(|message_id| {
            json!([{
                "type": ["SourceDocument"],
                "messageId": message_id,
                "sourceField": field,
                "sourceValue": number_value(source_value),
                "threshold": number_value(threshold),
                "chunkNumber": piece.number,
                "maxChunks": piece.of,
            }])
        });
        let vc = ctx
            .services()
            .issuer
            .create_vc(ctx.policy_owner(), subject, evidence)
            .await
            .or_block(ctx)?;

        let mut doc = PolicyDocument::new(clone.owner, vc);
        doc.hash = shared_crypto::hash_json_base58(&doc.document).ok();
        doc.group = clone.group;
        doc.policy_id = clone.policy_id;
        doc.topic_id = clone.topic_id;
        doc.accounts = clone.accounts;
        doc.option = clone.option;
        doc.relationships = source.message_id.iter().cloned().collect();
        Ok(doc)
    }

    /// Split every document, returning the closed chunks.
    async fn add_documents(
        &self,
        ctx: &BlockContext<'_>,
        user: &PolicyUser,
        documents: &[PolicyDocument],
    ) -> BlockResult<Vec<Vec<PolicyDocument>>> {
        let threshold = option_f64(ctx.options(), "threshold")
            .filter(|t| *t > 0.0)
            .ok_or_else(|| ctx.error("Option \"threshold\" is not set"))?;
        let field = option_str(ctx.options(), "sourceField")
            .ok_or_else(|| ctx.error("Option \"sourceField\" is not set"))?;

        let mut residue = self.residue(&user.did);
        let mut chunks: Vec<Vec<PolicyDocument>> = Vec::new();
        for source in documents {
            let value = serde_json::to_value(source)
                .ok()
                .and_then(|record| get_path(&record, field).and_then(as_f64))
                .unwrap_or(0.0);
            let total: f64 = residue.iter().map(|r| r.value).sum();
            for step in plan(total, threshold, value) {
                match step {
                    Step::Close => {
                        chunks.push(residue.drain(..).map(|r| r.document).collect());
                    }
                    Step::Push(piece) => {
                        let document = self
                            .piece_document(ctx, source, field, piece, value, threshold)
                            .await?;
                        residue.push(Residue {
                            value: piece.value,
                            document,
                        });
                    }
                    Step::Chunk(piece) => {
                        let document = self
                            .piece_document(ctx, source, field, piece, value, threshold)
                            .await?;
                        chunks.push(vec![document]);
                    }
                }
            }
        }

        debug!(
            block = %ctx.block_id(),
            user = %user.did,
            chunks = chunks.len(),
            residue = residue.len(),
            "[pe-04] Documents split"
        );
        self.residue.lock().insert(user.did.clone(), residue);
        ctx.save_state().await;
        Ok(chunks)
    }
}

#[async_trait]
impl PolicyBlock for SplitBlock {
    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        let documents = event.data.into_documents();
        let chunks = self.add_documents(ctx, &event.user, &documents).await?;
        for chunk in chunks {
            ctx.trigger(PolicyEventType::RunEvent, &event.user, chunk)
                .await;
        }
        ctx.trigger(
            PolicyEventType::RefreshEvent,
            &event.user,
            EventData::Documents(documents),
        )
        .await;
        Ok(())
    }

    fn save_state(&self) -> Option<Value> {
        let state = SplitState {
            residue: self.residue.lock().clone(),
        };
        serde_json::to_value(state).ok()
    }

    fn restore_state(&self, state: Value) -> Result<(), serde_json::Error> {
        let state: SplitState = serde_json::from_value(state)?;
        *self.residue.lock() = state.residue;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{block, engine_with, policy, recorded_batches, recorder, validate_single, vc};

    /// Run `plan` over a series of values the way the block does.
    fn simulate(threshold: f64, values: &[f64]) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut residue: Vec<f64> = Vec::new();
        let mut chunks = Vec::new();
        for &value in values {
            for step in plan(residue.iter().sum(), threshold, value) {
                match step {
                    Step::Close => chunks.push(std::mem::take(&mut residue)),
                    Step::Push(piece) => residue.push(piece.value),
                    Step::Chunk(piece) => chunks.push(vec![piece.value]),
                }
            }
        }
        (chunks, residue)
    }

    #[test]
    fn test_split_accounting() {
        let (chunks, residue) = simulate(40.0, &[30.0, 50.0, 25.0]);
        assert_eq!(chunks, vec![vec![30.0, 10.0], vec![40.0]]);
        assert_eq!(residue, vec![25.0]);
    }

    #[test]
    fn test_exact_fit_closes_residue() {
        let (chunks, residue) = simulate(40.0, &[30.0, 10.0]);
        assert_eq!(chunks, vec![vec![30.0, 10.0]]);
        assert!(residue.is_empty());
    }

    #[test]
    fn test_piece_numbering() {
        let steps = plan(0.0, 40.0, 100.0);
        assert_eq!(
            steps,
            vec![
                Step::Push(Piece { value: 40.0, number: 1, of: 3 }),
                Step::Close,
                Step::Chunk(Piece { value: 40.0, number: 2, of: 3 }),
                Step::Push(Piece { value: 20.0, number: 3, of: 3 }),
            ]
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_chunks_fill_threshold(
            threshold in 1u32..100,
            values in proptest::collection::vec(1u32..250, 1..12),
        ) {
            let values: Vec<f64> = values.into_iter().map(f64::from).collect();
            let threshold = f64::from(threshold);
            let (chunks, residue) = simulate(threshold, &values);
            for chunk in &chunks {
                proptest::prop_assert_eq!(chunk.iter().sum::<f64>(), threshold);
            }
            let total: f64 = chunks.iter().flatten().chain(residue.iter()).sum();
            proptest::prop_assert_eq!(total, values.iter().sum::<f64>());
            proptest::prop_assert!(residue.iter().sum::<f64>() < threshold);
        }
    }

    #[test]
    fn test_full_residue_flushed_first() {
        // a residue that already reached the threshold closes before cutting
        assert_eq!(plan(40.0, 40.0, 5.0)[0], Step::Close);
    }

    #[test]
    fn test_validator() {
        let config = BlockConfig::new(BLOCK_TYPE)
            .with_id("s")
            .with_option("threshold", json!("-1"));
        assert_eq!(
            validate_single(config),
            vec![
                "Option \"threshold\" must be a positive number".to_string(),
                "Option \"sourceField\" is not set".to_string(),
            ]
        );
    }

    fn reading(amount: f64, message_id: Option<&str>) -> PolicyDocument {
        let mut doc = vc("did:installer", json!({"amount": amount, "site": "A"}));
        doc.message_id = message_id.map(str::to_string);
        doc
    }

    #[tokio::test]
    async fn test_split_through_engine() {
        let split = block(BLOCK_TYPE, "split")
            .with_option("threshold", json!(40))
            .with_option("sourceField", json!("document.credentialSubject.0.amount"));
        let env = engine_with(policy(vec![split, recorder("chunks")]));
        env.activate().await;

        let user = PolicyUser::new("did:installer");
        let batch = vec![
            reading(30.0, Some("1700000000.1")),
            reading(50.0, Some("1700000000.2")),
            reading(25.0, None),
        ];
        env.run("split", &user, EventData::Documents(batch)).await.unwrap();

        let batches = recorded_batches(&env, "chunks").await;
        let amounts: Vec<Vec<Value>> = batches
            .iter()
            .map(|chunk| chunk.iter().map(|d| d.subject_field("amount").cloned().unwrap()).collect())
            .collect();
        assert_eq!(amounts, vec![vec![json!(30), json!(10)], vec![json!(40)]]);

        let second = &batches[1][0];
        let evidence = &second.document["evidence"][0];
        assert_eq!(evidence["messageId"], json!("1700000000.2"));
        assert_eq!(evidence["chunkNumber"], json!(2));
        assert_eq!(evidence["maxChunks"], json!(2));
        assert_eq!(second.subject_field("site"), Some(&json!("A")));

        // the unpublished remainder waits without evidence
        let state = env.backend.states.get("p1", "split-id").unwrap();
        let waiting = &state["residue"]["did:installer"];
        assert_eq!(waiting.as_array().unwrap().len(), 1);
        assert_eq!(waiting[0]["value"], json!(25.0));
        assert!(waiting[0]["document"]["document"].get("evidence").is_none());
    }

    #[tokio::test]
    async fn test_residue_survives_reload() {
        let split = block(BLOCK_TYPE, "split")
            .with_option("threshold", json!(40))
            .with_option("sourceField", json!("document.credentialSubject.0.amount"));
        let env = engine_with(policy(vec![split, recorder("chunks")]));
        env.activate().await;
        let user = PolicyUser::new("did:installer");
        env.run("split", &user, EventData::Document(reading(30.0, None)))
            .await
            .unwrap();

        // reactivation rebuilds the tree from persisted state
        env.activate().await;
        env.run("split", &user, EventData::Document(reading(10.0, None)))
            .await
            .unwrap();

        let batches = recorded_batches(&env, "chunks").await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }
}
