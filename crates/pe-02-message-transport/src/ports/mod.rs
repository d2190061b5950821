//! # Ports Layer
//!
//! - `inbound.rs` - API the transport exposes to policy blocks
//! - `outbound.rs` - Ledger, blob and virtual-store dependencies

pub mod inbound;
pub mod outbound;

pub use inbound::{MessageTransportApi, SendOptions};
pub use outbound::{
    BlobStore, CredentialResolver, LedgerReader, LedgerSubmitter, OperatorCredentials,
    SubmitReceipt, TopicRecord, VirtualMessageRecord, VirtualMessageStore,
};
