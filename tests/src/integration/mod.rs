//! Cross-crate policy flows.

pub mod fixtures;

mod interface;
mod pipeline;
mod routing;
mod runtime;
mod scheduling;
