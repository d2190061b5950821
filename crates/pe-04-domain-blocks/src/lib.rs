//! # Domain Blocks
//!
//! Block types for policy trees, plus the formula language their options
//! are written in.
//!
//! ## Block types
//!
//! | Block type                      | Role            | Purpose                                   |
//! |---------------------------------|-----------------|-------------------------------------------|
//! | `interfaceContainerBlock`       | `Container`     | groups children, lists the visible ones   |
//! | `interfaceStepBlock`            | `StepContainer` | one child at a time per user              |
//! | `interfaceDocumentsSourceBlock` | `Source`        | lists documents, fires actions on one     |
//! | `documentsSourceAddon`          | `Addon`         | stored documents with filters and order   |
//! | `filtersAddon`                  | `Addon`         | per-user field filter                     |
//! | `mintDocumentBlock`             | `Terminal`      | mint tokens for a batch of credentials    |
//! | `retirementDocumentBlock`       | `Terminal`      | wipe tokens                               |
//! | `splitBlock`                    | `Terminal`      | cut values into threshold-sized chunks    |
//! | `switchBlock`                   | `Terminal`      | route by condition                        |
//! | `aggregateDocumentBlock`        | `Terminal`      | buffer and release groups of documents    |
//! | `timerBlock`                    | `Terminal`      | periodic `TimerEvent` for armed users     |
//!
//! ## Example
//!
//! ```rust,ignore
//! use pe_03_policy_engine::{PolicyEngine, PolicyEngineApi};
//! use pe_03_policy_engine::adapters::InMemoryBackend;
//!
//! let backend = InMemoryBackend::default();
//! let engine = PolicyEngine::new(pe_04_domain_blocks::registry(), backend.services());
//! engine.activate(policy).await?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod blocks;
pub mod error;
pub mod formula;

#[cfg(test)]
mod test_support;

pub use blocks::{register_all, registry, DESCRIPTORS};
pub use error::{FormulaError, FormulaResult};
pub use formula::{Formula, FormulaValue, Scope};
