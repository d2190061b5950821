//! # Core Domain Entities
//!
//! Users acting on a policy, the documents flowing between blocks, and the
//! token descriptors that mint and retirement blocks operate on.
//!
//! ## Clusters
//!
//! - **Identity**: `PolicyUser`
//! - **Documents**: `PolicyDocument`, `DocumentSignature`
//! - **Tokens**: `TokenInfo`, `TokenType`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A user as seen by one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUser {
    pub did: String,
    /// Role registered in this policy, if any.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub hedera_account_id: Option<String>,
}

impl PolicyUser {
    /// A user with no role.
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            ..Self::default()
        }
    }

    /// Builder: attach a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Builder: attach a group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Builder: attach a ledger account.
    #[must_use]
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.hedera_account_id = Some(account.into());
        self
    }
}

// =============================================================================
// CLUSTER B: DOCUMENTS
// =============================================================================

/// Result of verifying a document's proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentSignature {
    #[default]
    New,
    Invalid,
    Verified,
}

/// A credential document travelling through the block tree.
///
/// `document` holds the VC (or VP) JSON as issued; everything else is
/// policy bookkeeping around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    /// Internal storage id.
    pub id: String,
    #[serde(default)]
    pub hash: Option<String>,
    /// DID of the document owner.
    pub owner: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub policy_id: Option<String>,
    /// Tag of the block that stored the document.
    #[serde(default)]
    pub tag: Option<String>,
    /// Ledger message id once published.
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
    pub document: Value,
    #[serde(default)]
    pub signature: DocumentSignature,
    /// Free-form workflow status fields.
    #[serde(default)]
    pub option: Map<String, Value>,
    /// Account ids extracted from the credential, keyed by field name.
    #[serde(default)]
    pub accounts: BTreeMap<String, String>,
}

impl PolicyDocument {
    /// Wrap a credential owned by `owner` under a fresh id.
    pub fn new(owner: impl Into<String>, document: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            hash: None,
            owner: owner.into(),
            group: None,
            policy_id: None,
            tag: None,
            message_id: None,
            topic_id: None,
            relationships: Vec::new(),
            document,
            signature: DocumentSignature::New,
            option: Map::new(),
            accounts: BTreeMap::new(),
        }
    }

    /// First credential subject of the document.
    ///
    /// Accepts both the array form and the single-object form.
    pub fn credential_subject(&self) -> Option<&Map<String, Value>> {
        match self.document.get("credentialSubject")? {
            Value::Array(items) => items.first().and_then(Value::as_object),
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Mutable access to the first credential subject.
    pub fn credential_subject_mut(&mut self) -> Option<&mut Map<String, Value>> {
        match self.document.get_mut("credentialSubject")? {
            Value::Array(items) => items.first_mut().and_then(Value::as_object_mut),
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Fields of the first credential subject, the evaluation scope of
    /// formulas and conditions. Empty when the document has no subject.
    pub fn vc_scope(&self) -> Map<String, Value> {
        self.credential_subject().cloned().unwrap_or_default()
    }

    /// Issuer DID, whether `issuer` is a plain string or `{ "id": ... }`.
    pub fn issuer(&self) -> Option<&str> {
        match self.document.get("issuer")? {
            Value::String(did) => Some(did),
            Value::Object(map) => map.get("id").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Look up a dotted path (`a.b.c`) inside the credential subject.
    pub fn subject_field(&self, path: &str) -> Option<&Value> {
        let mut current = self.credential_subject()?.get(path.split('.').next()?)?;
        for segment in path.split('.').skip(1) {
            current = current.get(segment)?;
        }
        Some(current)
    }
}

// =============================================================================
// CLUSTER C: TOKENS
// =============================================================================

/// Kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    Fungible,
    NonFungible,
}

/// Token descriptor looked up by mint and retirement blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub token_id: String,
    pub token_name: String,
    pub token_symbol: String,
    pub token_type: TokenType,
    /// Decimal places for fungible tokens.
    #[serde(default)]
    pub decimals: u32,
    /// DID of the token owner.
    #[serde(default)]
    pub owner: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subject_array_and_object_forms() {
        let array = PolicyDocument::new("did:a", json!({"credentialSubject": [{"x": 1}]}));
        let object = PolicyDocument::new("did:a", json!({"credentialSubject": {"x": 2}}));
        assert_eq!(array.vc_scope().get("x"), Some(&json!(1)));
        assert_eq!(object.vc_scope().get("x"), Some(&json!(2)));
    }

    #[test]
    fn test_issuer_forms() {
        let plain = PolicyDocument::new("did:a", json!({"issuer": "did:i"}));
        let nested = PolicyDocument::new("did:a", json!({"issuer": {"id": "did:j"}}));
        let none = PolicyDocument::new("did:a", json!({}));
        assert_eq!(plain.issuer(), Some("did:i"));
        assert_eq!(nested.issuer(), Some("did:j"));
        assert_eq!(none.issuer(), None);
    }

    #[test]
    fn test_subject_field_path() {
        let doc = PolicyDocument::new(
            "did:a",
            json!({"credentialSubject": [{"energy": {"amount": "12.5"}}]}),
        );
        assert_eq!(doc.subject_field("energy.amount"), Some(&json!("12.5")));
        assert_eq!(doc.subject_field("energy.missing"), None);
    }

    #[test]
    fn test_user_builder() {
        let user = PolicyUser::new("did:u").with_role("Installer").with_group("g1");
        assert_eq!(user.role.as_deref(), Some("Installer"));
        assert_eq!(user.group.as_deref(), Some("g1"));
    }
}
