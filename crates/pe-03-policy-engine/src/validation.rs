//! # Policy Validation
//!
//! One pre-order pass over a block config tree. Nothing is built and
//! nothing is mutated; errors accumulate per block and the report decides
//! whether the policy may be published.
//!
//! ```text
//! for each block (pre-order):
//!   1. id set and unique         "UUID is not set" / "UUID {id} already exist"
//!   2. tag unique in the tree    "Tag {tag} already exist"
//!   3. permissions known         "Permission {p} not exist"
//!   4. type registered           "Unknown block type"
//!   5. type-specific validator
//! ```

use crate::registry::BlockRegistry;
use serde::{Deserialize, Serialize};
use shared_types::{BlockConfig, PolicyConfig, SENTINEL_PERMISSIONS};
use std::collections::{HashMap, HashSet};

/// Errors of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockValidationResult {
    pub id: String,
    /// Block type.
    pub name: String,
    pub errors: Vec<String>,
    pub is_valid: bool,
}

/// Outcome of validating a policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Policy-level errors.
    pub errors: Vec<String>,
    pub blocks: Vec<BlockValidationResult>,
}

impl ValidationReport {
    /// Publishable iff there are no policy errors and every block is valid.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.blocks.iter().all(|b| b.is_valid)
    }

    pub fn invalid_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_valid).count()
    }

    /// Every error, prefixed with the block it belongs to.
    pub fn all_errors(&self) -> Vec<String> {
        let blocks = self.blocks.iter().flat_map(|block| {
            block
                .errors
                .iter()
                .map(move |err| format!("{} ({}): {err}", block.name, block.id))
        });
        self.errors.iter().cloned().chain(blocks).collect()
    }
}

/// View of one block handed to type-specific validators.
pub struct BlockValidator<'a> {
    config: &'a BlockConfig,
    tags: &'a HashMap<&'a str, usize>,
    errors: Vec<String>,
}

impl<'a> BlockValidator<'a> {
    pub fn config(&self) -> &'a BlockConfig {
        self.config
    }

    pub fn tag(&self) -> Option<&'a str> {
        self.config.tag.as_deref()
    }

    /// Whether any block in the tree carries `tag`.
    pub fn tag_exists(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Validate a detached policy config.
pub fn validate_policy(policy: &PolicyConfig, registry: &BlockRegistry) -> ValidationReport {
    let mut tags: HashMap<&str, usize> = HashMap::new();
    let mut ids: HashMap<&str, usize> = HashMap::new();
    policy.config.walk(&mut |block| {
        if let Some(tag) = block.tag.as_deref() {
            *tags.entry(tag).or_default() += 1;
        }
        if let Some(id) = block.id.as_deref() {
            *ids.entry(id).or_default() += 1;
        }
    });

    let permissions: HashSet<&str> = SENTINEL_PERMISSIONS
        .iter()
        .copied()
        .chain(policy.policy_roles.iter().map(String::as_str))
        .collect();

    let mut report = ValidationReport::default();
    if policy.owner.is_empty() {
        report.errors.push("Policy owner is not set".to_string());
    }

    policy.config.walk(&mut |block| {
        let mut validator = BlockValidator {
            config: block,
            tags: &tags,
            errors: Vec::new(),
        };

        match block.id.as_deref() {
            None => validator.add_error("UUID is not set"),
            Some(id) if ids.get(id).copied().unwrap_or(0) > 1 => {
                validator.add_error(format!("UUID {id} already exist"));
            }
            Some(_) => {}
        }
        if let Some(tag) = block.tag.as_deref() {
            if tags.get(tag).copied().unwrap_or(0) > 1 {
                validator.add_error(format!("Tag {tag} already exist"));
            }
        }
        for permission in &block.permissions {
            if !permissions.contains(permission.as_str()) {
                validator.add_error(format!("Permission {permission} not exist"));
            }
        }
        match registry.get(&block.block_type) {
            None => validator.add_error("Unknown block type"),
            Some(descriptor) => {
                if let Some(validate) = descriptor.validator {
                    validate(&mut validator);
                }
            }
        }

        let errors = validator.errors;
        report.blocks.push(BlockValidationResult {
            id: block.id.clone().unwrap_or_default(),
            name: block.block_type.clone(),
            is_valid: errors.is_empty(),
            errors,
        });
    });

    report
}
