//! `retirementDocumentBlock`: wipe tokens backed by a batch of credentials.
//!
//! Fungible tokens wipe `Σ rule` scaled to the token's decimals. NFTs wipe
//! the serials selected by `serialNumbersExpression`. The wipe credential
//! and a presentation of the batch are published before the wipe, which
//! carries the presentation's message id as its memo.

use super::common::{
    option_str, resolve_topic, send_vc, send_vp, store_document, BatchRefs, OrBlockError,
};
use super::token::{
    account_field, document_owner, parse_serials, resolve_token, target_account, token_amount,
};
use crate::formula;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use pe_03_policy_engine::{
    BlockContext, BlockResult, BlockValidator, EngineResult, EventData, PolicyBlock, PolicyEvent,
    TokenAmount,
};
use serde_json::{json, Map, Value};
use shared_types::{BlockConfig, PolicyDocument, PolicyEventType, PolicyUser, TokenInfo, TokenType};
use tracing::info;

pub const BLOCK_TYPE: &str = "retirementDocumentBlock";

const CATEGORY: &str = "RETIREMENT";

pub struct RetirementBlock;

pub fn factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::new(RetirementBlock))
}

pub fn validate(v: &mut BlockValidator<'_>) {
    let config = v.config();
    if !config.option_bool("useTemplate") && config.option_str("tokenId").is_none() {
        v.add_error("Option \"tokenId\" is not set");
    }
    if let Some(Err(err)) = config.option_str("rule").map(formula::Formula::parse) {
        v.add_error(format!("Option \"rule\" is not a valid formula: {err}"));
    }
}

/// What a wipe removes.
#[derive(Debug, PartialEq)]
struct WipePlan {
    amount: TokenAmount,
    display: String,
    serials: Vec<u64>,
}

fn plan_wipe(
    token: &TokenInfo,
    options: &Map<String, Value>,
    docs: &[PolicyDocument],
) -> Result<WipePlan, String> {
    match token.token_type {
        TokenType::NonFungible => {
            let Some(expression) = option_str(options, "serialNumbersExpression") else {
                return Err("For NON_FUNGIBLE tokens, Serial numbers is required".into());
            };
            let serials = parse_serials(expression, docs)?;
            Ok(WipePlan {
                amount: TokenAmount::Serials(serials.clone()),
                display: serials.len().to_string(),
                serials,
            })
        }
        TokenType::Fungible => {
            let Some(rule) = option_str(options, "rule") else {
                return Err("For FUNGIBLE tokens, Rule is required".into());
            };
            let amount = formula::aggregate(rule, docs).map_err(|err| err.to_string())?;
            let Some((value, display)) = token_amount(token, amount) else {
                return Err(format!("Invalid token value: {amount}"));
            };
            Ok(WipePlan {
                amount: TokenAmount::Units(value),
                display,
                serials: Vec::new(),
            })
        }
    }
}

impl RetirementBlock {
    async fn retire(
        &self,
        ctx: &BlockContext<'_>,
        owner: &PolicyUser,
        docs: &[PolicyDocument],
    ) -> BlockResult<()> {
        let token = resolve_token(ctx, docs).await?;
        let refs = BatchRefs::collect(ctx, docs, account_field(ctx))?;
        let target = target_account(ctx, docs, &refs, owner)?;
        let topic = resolve_topic(ctx, &refs.topics)?;
        let plan = plan_wipe(&token, ctx.options(), docs).map_err(|err| ctx.error(err))?;

        let mut subject = json!({
            "date": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "tokenId": token.token_id,
            "amount": plan.display,
        });
        if !plan.serials.is_empty() {
            let serials: Vec<String> = plan.serials.iter().map(u64::to_string).collect();
            subject["serialNumbers"] = json!(serials.join(","));
        }

        let issuer = ctx.services().issuer.clone();
        let wipe_vc = issuer
            .create_vc(ctx.policy_owner(), subject, None)
            .await
            .or_block(ctx)?;
        let mut credentials: Vec<Value> = docs.iter().map(|doc| doc.document.clone()).collect();
        credentials.push(wipe_vc.clone());
        let vp = issuer
            .create_vp(ctx.policy_owner(), credentials)
            .await
            .or_block(ctx)?;

        let mut relationships = refs.messages;
        let vc_message = send_vc(ctx, &wipe_vc, &relationships, &topic).await?;
        let wipe_doc =
            store_document(ctx, owner, wipe_vc, &vc_message, &relationships, CATEGORY).await?;
        relationships.extend(wipe_doc.message_id.clone());
        let vp_message = send_vp(ctx, &vp, &relationships, &topic).await?;
        let vp_doc = store_document(ctx, owner, vp, &vp_message, &relationships, CATEGORY).await?;

        let memo = vp_doc.message_id.clone().unwrap_or_default();
        ctx.services()
            .tokens
            .wipe(&token, &target, plan.amount, &memo)
            .await
            .or_block(ctx)?;
        info!(
            block = %ctx.block_id(),
            token = %token.token_id,
            account = %target,
            amount = %plan.display,
            "[pe-04] Tokens wiped"
        );
        Ok(())
    }
}

#[async_trait]
impl PolicyBlock for RetirementBlock {
    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        let docs: Vec<PolicyDocument> = event.data.documents().into_iter().cloned().collect();
        let owner = document_owner(ctx, &docs).await?;
        self.retire(ctx, &owner, &docs).await?;

        ctx.trigger(PolicyEventType::RunEvent, &owner, event.data.clone())
            .await;
        ctx.trigger(PolicyEventType::ReleaseEvent, &owner, EventData::Empty)
            .await;
        ctx.trigger(PolicyEventType::RefreshEvent, &owner, event.data)
            .await;
        Ok(())
    }
}
