//! Block types provided by this crate and their registration.

pub(crate) mod common;
pub mod token;

pub mod aggregate;
pub mod container;
pub mod documents_source;
pub mod filters_addon;
pub mod mint;
pub mod retirement;
pub mod source_addon;
pub mod split;
pub mod step;
pub mod switch;
pub mod timer;

use pe_03_policy_engine::{BlockDescriptor, BlockRegistry, BlockRole};

/// Every block type of this crate.
pub const DESCRIPTORS: [BlockDescriptor; 11] = [
    BlockDescriptor::new(container::BLOCK_TYPE, BlockRole::Container, container::factory),
    BlockDescriptor::new(step::BLOCK_TYPE, BlockRole::StepContainer, step::factory)
        .with_validator(step::validate),
    BlockDescriptor::new(
        documents_source::BLOCK_TYPE,
        BlockRole::Source,
        documents_source::factory,
    ),
    BlockDescriptor::new(source_addon::BLOCK_TYPE, BlockRole::Addon, source_addon::factory)
        .with_validator(source_addon::validate),
    BlockDescriptor::new(filters_addon::BLOCK_TYPE, BlockRole::Addon, filters_addon::factory)
        .with_validator(filters_addon::validate),
    BlockDescriptor::new(mint::BLOCK_TYPE, BlockRole::Terminal, mint::factory)
        .with_validator(mint::validate),
    BlockDescriptor::new(retirement::BLOCK_TYPE, BlockRole::Terminal, retirement::factory)
        .with_validator(retirement::validate),
    BlockDescriptor::new(split::BLOCK_TYPE, BlockRole::Terminal, split::factory)
        .with_validator(split::validate),
    BlockDescriptor::new(switch::BLOCK_TYPE, BlockRole::Terminal, switch::factory)
        .with_validator(switch::validate),
    BlockDescriptor::new(aggregate::BLOCK_TYPE, BlockRole::Terminal, aggregate::factory)
        .with_validator(aggregate::validate),
    BlockDescriptor::new(timer::BLOCK_TYPE, BlockRole::Terminal, timer::factory)
        .with_validator(timer::validate),
];

/// Register every block type of this crate.
pub fn register_all(registry: &mut BlockRegistry) {
    for descriptor in DESCRIPTORS {
        registry.register(descriptor);
    }
}

/// A registry holding only this crate's block types.
pub fn registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    register_all(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_block_types_unique() {
        let types: HashSet<&str> = DESCRIPTORS.iter().map(|d| d.block_type).collect();
        assert_eq!(types.len(), DESCRIPTORS.len());
        let registry = registry();
        assert!(registry.contains(mint::BLOCK_TYPE));
        assert!(registry.contains(step::BLOCK_TYPE));
    }
}
