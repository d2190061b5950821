//! # Policy Engine Test Suite
//!
//! Flows that cross crate boundaries: domain blocks wired into the engine,
//! the engine on top of the transport, and the runtime binary's library.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs     # Engine setup and a recording block
//!     ├── pipeline.rs     # split -> mint, dry-run transport
//!     ├── routing.rs      # switch -> aggregate -> mint
//!     ├── interface.rs    # documents source actions, step progress
//!     ├── scheduling.rs   # timer -> aggregate -> mint
//!     └── runtime.rs      # policy file -> running policy
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pe-tests
//! cargo test -p pe-tests integration::routing::
//! ```

#![allow(dead_code)]

pub mod integration;
