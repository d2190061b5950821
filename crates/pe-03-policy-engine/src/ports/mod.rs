//! Ports (hexagonal boundaries) of the policy engine.

pub mod inbound;
pub mod outbound;

pub use inbound::{BlockRef, PolicyEngineApi};
pub use outbound::{
    CredentialIssuer, DocumentFilter, DocumentRepository, MintReceipt, PolicyRoleRepository,
    PolicyServices, StateRepository, TokenAmount, TokenService,
};
