//! Token lookups and amount arithmetic shared by mint and retirement.

use super::common::{option_bool, option_str, BatchRefs, OrBlockError};
use crate::formula;
use pe_03_policy_engine::{BlockContext, BlockResult};
use shared_types::{PolicyDocument, PolicyUser, TokenInfo, TokenType};
use std::collections::BTreeSet;
use tracing::warn;

/// Account field read from documents when `accountId` is not configured.
pub const DEFAULT_ACCOUNT_FIELD: &str = "default";

/// Token named by `tokenId`, or by the first document's template mapping
/// when `useTemplate` is set.
pub(crate) async fn resolve_token(
    ctx: &BlockContext<'_>,
    docs: &[PolicyDocument],
) -> BlockResult<TokenInfo> {
    let options = ctx.options();
    let token_id = if option_bool(options, "useTemplate") {
        let template = option_str(options, "template").unwrap_or_default();
        docs.first()
            .and_then(|doc| doc.option.get("tokens"))
            .and_then(|tokens| tokens.get(template))
            .and_then(|id| id.as_str())
            .map(str::to_string)
    } else {
        option_str(options, "tokenId").map(str::to_string)
    };
    let Some(token_id) = token_id else {
        return Err(ctx.error("Bad token id"));
    };
    ctx.services()
        .tokens
        .get_token(&token_id)
        .await
        .or_block(ctx)?
        .ok_or_else(|| ctx.error("Bad token id"))
}

/// Scale a decimal amount to the token's smallest unit.
///
/// Returns the ledger value and its display form: NFTs count whole
/// serials, fungible tokens round `amount * 10^decimals`. `None` for
/// negative or non-finite amounts, and when the scaled value does not fit a
/// ledger amount.
pub fn token_amount(token: &TokenInfo, amount: f64) -> Option<(u64, String)> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let (scale, scaled) = match token.token_type {
        TokenType::NonFungible => (1.0, amount.floor()),
        TokenType::Fungible => {
            let scale = 10f64.powi(token.decimals as i32);
            (scale, (amount * scale).round())
        }
    };
    if scaled >= u64::MAX as f64 {
        return None;
    }
    let value = scaled as u64;
    let display = match token.token_type {
        TokenType::NonFungible => value.to_string(),
        TokenType::Fungible => format!("{:.*}", token.decimals as usize, value as f64 / scale),
    };
    Some((value, display))
}

/// The account that receives minted tokens or loses wiped ones.
///
/// `custom-value` accounts come from `accountIdValue`. Otherwise the
/// configured `accountId` field of the first document wins, falling back
/// to the relayer: the first document's default account or its owner's.
pub(crate) fn target_account(
    ctx: &BlockContext<'_>,
    docs: &[PolicyDocument],
    refs: &BatchRefs,
    owner: &PolicyUser,
) -> BlockResult<String> {
    let options = ctx.options();
    if option_str(options, "accountType") == Some("custom-value") {
        return option_str(options, "accountIdValue")
            .map(str::to_string)
            .ok_or_else(|| ctx.error("Token recipient is not set"));
    }

    let first = refs.accounts.first();
    if let Some(first) = first {
        if refs.accounts.iter().any(|account| account != first) {
            warn!(
                block = %ctx.block_id(),
                account = %first,
                "[pe-04] More than one account found! Transfer made on the first"
            );
        }
    }

    let target = if option_str(options, "accountId").is_some() {
        first.cloned()
    } else {
        relayer_account(docs, owner)
    };
    target.ok_or_else(|| ctx.error("Token recipient is not set"))
}

/// Account the document owner acts through.
pub(crate) fn relayer_account(docs: &[PolicyDocument], owner: &PolicyUser) -> Option<String> {
    docs.first()
        .and_then(|doc| doc.accounts.get(DEFAULT_ACCOUNT_FIELD).cloned())
        .or_else(|| owner.hedera_account_id.clone())
}

/// Field of `accounts` that carries the target account.
pub(crate) fn account_field<'a>(ctx: &BlockContext<'a>) -> &'a str {
    option_str(ctx.options(), "accountId").unwrap_or(DEFAULT_ACCOUNT_FIELD)
}

/// Owner of the first document, resolved to a registered user.
pub(crate) async fn document_owner(
    ctx: &BlockContext<'_>,
    docs: &[PolicyDocument],
) -> BlockResult<PolicyUser> {
    match docs.first() {
        Some(doc) if !doc.owner.is_empty() => Ok(ctx.find_user(&doc.owner).await),
        Some(_) => Err(ctx.error("Bad User DID")),
        None => Err(ctx.error("Bad VC")),
    }
}

/// Serial numbers selected by a retirement expression.
///
/// The expression is a comma separated list of formulas or `start-end`
/// ranges. Each formula is summed over the documents; results must be
/// integers of at least 1 and ranges must not run backwards. The result is
/// sorted and deduplicated.
pub fn parse_serials(expression: &str, docs: &[PolicyDocument]) -> Result<Vec<u64>, String> {
    let mut serials = BTreeSet::new();
    for item in expression.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.find('-').filter(|&dash| dash > 0) {
            Some(dash) => {
                let start = serial_value(item[..dash].trim(), docs)?;
                let end = serial_value(item[dash + 1..].trim(), docs)?;
                if start > end {
                    return Err(
                        "End serial number must be greater than or equal to start serial number."
                            .into(),
                    );
                }
                serials.extend(start..=end);
            }
            None => {
                serials.insert(serial_value(item, docs)?);
            }
        }
    }
    if serials.is_empty() {
        return Err("No valid Serial Numbers found".into());
    }
    Ok(serials.into_iter().collect())
}

fn serial_value(rule: &str, docs: &[PolicyDocument]) -> Result<u64, String> {
    let value = formula::aggregate(rule, docs).map_err(|err| err.to_string())?;
    if !value.is_finite() || value.fract() != 0.0 {
        return Err("Serial numbers must be integers.".into());
    }
    if value < 1.0 {
        return Err("Serial numbers must be greater than or equal to 1".into());
    }
    Ok(value as u64)
}
