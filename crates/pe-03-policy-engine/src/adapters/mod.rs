//! Adapters for the engine's driven ports.

pub mod memory;

pub use memory::{
    in_memory_services, InMemoryBackend, InMemoryDocumentRepository, InMemoryRoleRepository,
    InMemoryStateRepository, InMemoryTokenService, LocalCredentialIssuer, TokenOperation,
};
