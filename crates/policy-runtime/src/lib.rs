//! # Policy Runtime
//!
//! Loads one policy file and runs it against the in-memory adapters.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `PE_*` variables
//! 2. Read and parse the policy JSON
//! 3. Validate the block tree, refusing to start on any error
//! 4. Activate the policy in dry-run mode
//! 5. Log engine notifications until Ctrl+C

pub mod config;
pub mod runtime;

pub use config::{ConfigError, RuntimeConfig};
pub use runtime::{load_policy, log_report, PolicyRuntime, RuntimeError};
