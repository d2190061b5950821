//! Block type registry: `blockType` to factory, validator and role.

use crate::domain::{BlockRole, PolicyBlock};
use crate::error::EngineResult;
use crate::validation::BlockValidator;
use shared_types::BlockConfig;
use std::collections::HashMap;

/// Builds a behavior from its config node.
pub type BlockFactory = fn(&BlockConfig) -> EngineResult<Box<dyn PolicyBlock>>;

/// Checks a config node's options.
pub type BlockValidatorFn = fn(&mut BlockValidator<'_>);

/// Everything the tree needs to know about a block type.
#[derive(Clone, Copy)]
pub struct BlockDescriptor {
    pub block_type: &'static str,
    pub role: BlockRole,
    pub factory: BlockFactory,
    pub validator: Option<BlockValidatorFn>,
}

impl BlockDescriptor {
    pub const fn new(block_type: &'static str, role: BlockRole, factory: BlockFactory) -> Self {
        Self {
            block_type,
            role,
            factory,
            validator: None,
        }
    }

    #[must_use]
    pub const fn with_validator(mut self, validator: BlockValidatorFn) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl std::fmt::Debug for BlockDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDescriptor")
            .field("block_type", &self.block_type)
            .field("role", &self.role)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Registered block types.
#[derive(Debug, Default, Clone)]
pub struct BlockRegistry {
    descriptors: HashMap<&'static str, BlockDescriptor>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block type, replacing any previous registration.
    pub fn register(&mut self, descriptor: BlockDescriptor) -> &mut Self {
        self.descriptors.insert(descriptor.block_type, descriptor);
        self
    }

    pub fn get(&self, block_type: &str) -> Option<&BlockDescriptor> {
        self.descriptors.get(block_type)
    }

    pub fn contains(&self, block_type: &str) -> bool {
        self.descriptors.contains_key(block_type)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registered type names, sorted.
    pub fn block_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.descriptors.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl PolicyBlock for Noop {}

    fn noop(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
        Ok(Box::new(Noop))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = BlockRegistry::new();
        registry
            .register(BlockDescriptor::new("b", BlockRole::Terminal, noop))
            .register(BlockDescriptor::new("a", BlockRole::Container, noop));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.block_types(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().role, BlockRole::Container);
        assert!(!registry.contains("c"));
    }
}
