//! `mintDocumentBlock`: turn a batch of credentials into minted tokens.
//!
//! ```text
//! docs ──rule──► amount ──decimals──► token value
//!   │                                     │
//!   │  mint VC {date, tokenId, amount} ───┤ CreateVC (relationships = source ids)
//!   └─ VP [docs…, mint VC] ───────────────┤ CreateVP (relationships += mint VC id)
//!                                         ▼
//!                         TokenService::mint(memo = VP id + memo template)
//! ```
//!
//! Then `RunEvent` (result = VP), `ReleaseEvent` and `RefreshEvent` fire.

use super::common::{
    option_str, resolve_topic, send_vc, send_vp, store_document, BatchRefs, OrBlockError,
};
use super::token::{account_field, document_owner, resolve_token, target_account, token_amount};
use crate::formula;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use pe_01_message_envelope::memo::parse_memo;
use pe_03_policy_engine::{
    BlockContext, BlockResult, BlockValidator, EngineResult, EventData, EventState, PolicyBlock,
    PolicyEvent,
};
use serde_json::{json, Value};
use shared_types::{BlockConfig, PolicyDocument, PolicyEventType, PolicyUser};
use tracing::info;

pub const BLOCK_TYPE: &str = "mintDocumentBlock";

/// Category recorded on documents this block stores.
const CATEGORY: &str = "MINT";

pub struct MintBlock;

pub fn factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::new(MintBlock))
}

pub fn validate(v: &mut BlockValidator<'_>) {
    let config = v.config();
    if !config.option_bool("useTemplate") && config.option_str("tokenId").is_none() {
        v.add_error("Option \"tokenId\" is not set");
    }
    if config.option_str("rule").map_or(true, |rule| rule.trim().is_empty()) {
        v.add_error("Option \"rule\" is not set");
    } else if let Some(Err(err)) = config.option_str("rule").map(formula::Formula::parse) {
        v.add_error(format!("Option \"rule\" is not a valid formula: {err}"));
    }
    if config.option_str("accountType") == Some("custom-value")
        && config.option_str("accountIdValue").is_none()
    {
        v.add_error("Option \"accountIdValue\" is not set");
    }
}

impl MintBlock {
    async fn mint(
        &self,
        ctx: &BlockContext<'_>,
        owner: &PolicyUser,
        docs: &[PolicyDocument],
    ) -> BlockResult<PolicyDocument> {
        let token = resolve_token(ctx, docs).await?;
        let refs = BatchRefs::collect(ctx, docs, account_field(ctx))?;
        let target = target_account(ctx, docs, &refs, owner)?;
        let topic = resolve_topic(ctx, &refs.topics)?;

        let rule = option_str(ctx.options(), "rule").unwrap_or_default();
        let amount = formula::aggregate(rule, docs).or_block(ctx)?;
        let Some((token_value, display_amount)) = token_amount(&token, amount) else {
            return Err(ctx.error(format!("Invalid token value: {amount}")));
        };

        let issuer = ctx.services().issuer.clone();
        let policy_owner = ctx.policy_owner();
        let mint_vc = issuer
            .create_vc(
                policy_owner,
                json!({
                    "date": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    "tokenId": token.token_id,
                    "amount": display_amount,
                }),
                None,
            )
            .await
            .or_block(ctx)?;
        let mut credentials: Vec<Value> = docs.iter().map(|doc| doc.document.clone()).collect();
        credentials.push(mint_vc.clone());
        let vp = issuer
            .create_vp(policy_owner, credentials)
            .await
            .or_block(ctx)?;

        info!(block = %ctx.block_id(), topic = %topic, "[pe-04] Minting");

        let mut relationships = refs.messages;
        let vc_message = send_vc(ctx, &mint_vc, &relationships, &topic).await?;
        let mint_doc =
            store_document(ctx, owner, mint_vc, &vc_message, &relationships, CATEGORY).await?;
        relationships.extend(mint_doc.message_id.clone());

        let vp_message = send_vp(ctx, &vp, &relationships, &topic).await?;
        let vp_doc = store_document(ctx, owner, vp, &vp_message, &relationships, CATEGORY).await?;

        let vp_id = vp_doc.message_id.clone().unwrap_or_default();
        let template = option_str(ctx.options(), "memo").unwrap_or_default();
        let memo = format!("{vp_id} {}", parse_memo(template, &vp_doc.document));
        let receipt = ctx
            .services()
            .tokens
            .mint(&token, &target, token_value, memo.trim_end())
            .await
            .or_block(ctx)?;

        info!(
            block = %ctx.block_id(),
            token = %receipt.token_id,
            account = %target,
            amount = receipt.amount,
            "[pe-04] Tokens minted"
        );
        Ok(vp_doc)
    }
}

#[async_trait]
impl PolicyBlock for MintBlock {
    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        let docs: Vec<PolicyDocument> = event.data.documents().into_iter().cloned().collect();
        let owner = document_owner(ctx, &docs).await?;
        let vp = self.mint(ctx, &owner, &docs).await?;

        let state = EventState::from(event.data).with_result(vp);
        ctx.trigger(PolicyEventType::RunEvent, &owner, state.clone())
            .await;
        ctx.trigger(PolicyEventType::ReleaseEvent, &owner, EventData::Empty)
            .await;
        ctx.trigger(PolicyEventType::RefreshEvent, &owner, state).await;
        Ok(())
    }
}
