//! Adapters for the transport's driven ports.

pub mod dry_run;
pub mod memory;

pub use dry_run::DryRunLedger;
pub use memory::{InMemoryBlobStore, InMemoryLedger, InMemoryVirtualStore, StaticCredentialResolver};
