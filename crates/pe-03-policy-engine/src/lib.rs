//! # Policy Engine
//!
//! Runtime for tree-shaped policies. A policy config is validated, built
//! into an arena of live blocks, wired with event links, restored from
//! persisted state and started.
//!
//! ## Architecture
//!
//! ```text
//!   API layer ──PolicyEngineApi──► PolicyEngine
//!                                     │ one PolicyTree per active policy
//!                                     ▼
//!   ┌──────────────────────────── PolicyTree ────────────────────────────┐
//!   │  BlockNode { uuid, tag, permissions, parent, children, links }     │
//!   │      └── Box<dyn PolicyBlock>   (domain behavior from registry)    │
//!   └────────────────────────────────────────────────────────────────────┘
//!          │ trigger(output) → links → dispatch(input) → handler
//!          ▼
//!   PolicyServices: transport, state, roles, documents, issuer, tokens,
//!                   notifier (shared-bus)
//! ```
//!
//! ## Block roles
//!
//! | Role            | Contract                                        |
//! |-----------------|-------------------------------------------------|
//! | `Terminal`      | plain action block                              |
//! | `Container`     | `get_data` lists available children             |
//! | `StepContainer` | one active child at a time, released by events  |
//! | `Source`        | pulls documents through its addon children      |
//! | `Addon`         | contributes documents or filters to a source    |
//!
//! ## Example
//!
//! ```rust,ignore
//! use pe_03_policy_engine::{PolicyEngine, PolicyEngineApi, BlockRegistry};
//! use pe_03_policy_engine::adapters::InMemoryBackend;
//!
//! let backend = InMemoryBackend::default();
//! let engine = PolicyEngine::new(registry, backend.services());
//!
//! engine.activate(policy).await?;
//! let data = engine.get_block_data(&policy_id, "approve_documents", &user).await?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod context;
pub mod domain;
pub mod error;
pub mod ports;
pub mod registry;
pub mod routing;
pub mod service;
pub mod tree;
pub mod validation;

pub use context::BlockContext;
pub use domain::{
    has_permission, BlockResult, BlockRole, EventData, EventLink, EventState, ImplicitLink,
    Period, PeriodUnit, PolicyBlock, PolicyEvent, Schedule, SourceQuery,
};
pub use error::{EngineResult, PolicyEngineError};
pub use ports::{
    BlockRef, CredentialIssuer, DocumentFilter, DocumentRepository, MintReceipt,
    PolicyEngineApi, PolicyRoleRepository, PolicyServices, StateRepository, TokenAmount,
    TokenService,
};
pub use registry::{BlockDescriptor, BlockFactory, BlockRegistry, BlockValidatorFn};
pub use service::PolicyEngine;
pub use tree::{BlockNode, PolicyTree};
pub use validation::{validate_policy, BlockValidationResult, BlockValidator, ValidationReport};
