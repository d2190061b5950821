//! The behavior contract implemented by every block type.
//!
//! The tree wraps each behavior in a [`BlockNode`](crate::tree::BlockNode)
//! that owns identity, structure and permissions. Behaviors only provide
//! domain logic; every method has a default so a block overrides what it
//! needs.

use crate::context::BlockContext;
use crate::domain::event::{ImplicitLink, PolicyEvent};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{PolicyDocument, PolicyEventType, PolicyUser};

/// Result type for block handlers.
pub type BlockResult<T> = Result<T, shared_types::BlockActionError>;

/// Structural role of a block, fixed per block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockRole {
    /// Plain action block.
    Terminal,
    /// Lists its available children.
    Container,
    /// Container that shows one child at a time.
    StepContainer,
    /// Pulls documents through its addons.
    Source,
    /// Contributes documents or filters to an enclosing source.
    Addon,
}

impl BlockRole {
    /// Whether refresh events from children bubble to this block.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Container | Self::StepContainer)
    }
}

/// Filters and paging handed down a source's addons.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceQuery {
    /// Field equality filters collected from filter addons.
    pub filters: serde_json::Map<String, Value>,
    pub page_index: Option<usize>,
    pub page_size: Option<usize>,
}

/// Domain behavior of one block type.
#[async_trait]
pub trait PolicyBlock: Send + Sync {
    /// Whether a link may target `input` on this block.
    fn accepts(&self, input: &PolicyEventType) -> bool {
        matches!(input, PolicyEventType::RunEvent | PolicyEventType::RefreshEvent)
    }

    /// Domain action for `RunEvent`.
    async fn run_action(&self, _ctx: &BlockContext<'_>, _event: PolicyEvent) -> BlockResult<()> {
        Ok(())
    }

    /// Handler for `RefreshEvent`. Re-renders the block by default.
    async fn refresh_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        ctx.update_block(&event.user).await;
        Ok(())
    }

    /// Handler for every other accepted input.
    async fn handle_event(&self, _ctx: &BlockContext<'_>, _event: PolicyEvent) -> BlockResult<()> {
        Ok(())
    }

    async fn get_data(&self, ctx: &BlockContext<'_>, _user: &PolicyUser) -> BlockResult<Value> {
        Err(ctx.error("Block is not supporting get data functions"))
    }

    async fn set_data(
        &self,
        ctx: &BlockContext<'_>,
        _user: &PolicyUser,
        _data: Value,
    ) -> BlockResult<Value> {
        Err(ctx.error("Block is not supporting set data functions"))
    }

    /// Containers decide which children are active for a user.
    fn is_child_active(&self, _ctx: &BlockContext<'_>, _child: usize, _user: &PolicyUser) -> bool {
        true
    }

    /// Called on a container when one of its children is reached.
    async fn change_step(
        &self,
        _ctx: &BlockContext<'_>,
        _user: &PolicyUser,
        _child: usize,
    ) -> BlockResult<()> {
        Ok(())
    }

    /// Sources return documents, addons return what they contribute.
    async fn get_sources(
        &self,
        _ctx: &BlockContext<'_>,
        _user: &PolicyUser,
        _query: &SourceQuery,
    ) -> BlockResult<Vec<PolicyDocument>> {
        Ok(Vec::new())
    }

    /// Filters contributed by a filter addon for `user`.
    fn filters(&self, _user: &PolicyUser) -> serde_json::Map<String, Value> {
        serde_json::Map::new()
    }

    /// Links to add on top of the configured events.
    fn implicit_links(&self) -> Vec<ImplicitLink> {
        Vec::new()
    }

    /// Persistent state, `None` for stateless blocks.
    fn save_state(&self) -> Option<Value> {
        None
    }

    fn restore_state(&self, _state: Value) -> Result<(), serde_json::Error> {
        Ok(())
    }

    /// Called instead of `restore_state` when nothing was persisted.
    fn on_empty_state(&self) {}

    /// Called once after the tree is restored, before traffic.
    async fn start(&self, _ctx: &BlockContext<'_>) -> BlockResult<()> {
        Ok(())
    }

    /// Called by the block's schedule.
    async fn on_tick(&self, _ctx: &BlockContext<'_>) -> BlockResult<()> {
        Ok(())
    }

    fn destroy(&self) {}
}
