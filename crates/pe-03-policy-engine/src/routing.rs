//! # Event Routing
//!
//! Links are registered once, after construction:
//!
//! | Link                          | When                               |
//! |-------------------------------|------------------------------------|
//! | `RunEvent` → next sibling     | unless `stopPropagation` is set    |
//! | `RefreshEvent` → parent       | the parent is a container          |
//! | `ReleaseEvent` → parent       | the parent is a step container     |
//! | configured `events`           | not disabled, both tags resolve    |
//! | behavior implicit links       | e.g. switch condition targets      |
//!
//! Firing a link resolves the effective actor, then awaits the target's
//! handler before the next link fires. Handler failures are published to
//! the notifier and forwarded on the block's `ErrorEvent` links; they never
//! propagate to the firing block.

use crate::context::BlockContext;
use crate::domain::{
    has_permission, notifies_owner, BlockResult, EventData, EventLink, EventState, PolicyEvent,
};
use crate::tree::PolicyTree;
use shared_bus::EngineEvent;
use shared_types::{BlockActionError, EventActor, EventConfig, PolicyEventType, PolicyUser};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Boxed future returned by recursive routing calls.
pub type RouteFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

impl PolicyTree {
    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Register default, configured and implicit links for every block.
    pub fn register_links(&self) {
        for index in 0..self.nodes.len() {
            self.register_default_links(index);
        }
        for index in 0..self.nodes.len() {
            for event in &self.nodes[index].events {
                self.register_custom_link(index, event);
            }
        }
        for index in 0..self.nodes.len() {
            for link in self.nodes[index].behavior.implicit_links() {
                match self.index_by_tag(&link.target_tag) {
                    Some(target) => {
                        self.create_link(index, link.output, target, link.input, link.actor);
                    }
                    None => warn!(
                        policy_id = %self.policy.id,
                        source = %self.nodes[index].uuid,
                        target = %link.target_tag,
                        "[pe-03] link error"
                    ),
                }
            }
        }
    }

    fn register_default_links(&self, index: usize) {
        let node = &self.nodes[index];
        let Some(parent) = node.parent else {
            return;
        };
        let siblings = &self.nodes[parent].children;

        if !node.option_bool("stopPropagation") {
            let next = siblings
                .iter()
                .position(|&i| i == index)
                .and_then(|pos| siblings.get(pos + 1));
            if let Some(&next) = next {
                self.create_link(
                    index,
                    PolicyEventType::RunEvent,
                    next,
                    PolicyEventType::RunEvent,
                    EventActor::EventInitiator,
                );
            }
        }

        let parent_role = self.nodes[parent].role;
        if parent_role.is_container() {
            self.create_link(
                index,
                PolicyEventType::RefreshEvent,
                parent,
                PolicyEventType::RefreshEvent,
                EventActor::EventInitiator,
            );
        }
        if parent_role == crate::domain::BlockRole::StepContainer {
            self.create_link(
                index,
                PolicyEventType::ReleaseEvent,
                parent,
                PolicyEventType::ReleaseEvent,
                EventActor::EventInitiator,
            );
        }
    }

    fn register_custom_link(&self, index: usize, event: &EventConfig) {
        if event.disabled {
            return;
        }
        let own_tag = self.nodes[index].tag.as_deref();
        let resolve = |tag: &str| {
            if own_tag == Some(tag) {
                Some(index)
            } else {
                self.index_by_tag(tag)
            }
        };
        match (resolve(&event.source), resolve(&event.target)) {
            (Some(source), Some(target)) => {
                self.create_link(
                    source,
                    event.output.clone(),
                    target,
                    event.input.clone(),
                    event.actor,
                );
            }
            _ => warn!(
                policy_id = %self.policy.id,
                source = %event.source,
                target = %event.target,
                "[pe-03] link error"
            ),
        }
    }

    /// Register a link if the target handles `input`.
    fn create_link(
        &self,
        source: usize,
        output: PolicyEventType,
        target: usize,
        input: PolicyEventType,
        actor: EventActor,
    ) -> bool {
        if !self.nodes[target].behavior.accepts(&input) {
            warn!(
                policy_id = %self.policy.id,
                source = %self.nodes[source].uuid,
                target = %self.nodes[target].uuid,
                input = %input,
                "[pe-03] link error"
            );
            return false;
        }
        let link = EventLink {
            output,
            input,
            source,
            target,
            actor,
        };
        debug!(
            source = %self.nodes[source].uuid,
            target = %self.nodes[target].uuid,
            output = %link.output,
            input = %link.input,
            "[pe-03] link registered"
        );
        self.nodes[source].add_link(link)
    }

    // =========================================================================
    // FIRING
    // =========================================================================

    /// Fire every link of `source` with the given output, in link order.
    pub fn trigger<'a>(
        self: &'a Arc<Self>,
        source: usize,
        output: &'a PolicyEventType,
        user: &'a PolicyUser,
        state: EventState,
    ) -> RouteFuture<'a> {
        Box::pin(async move {
            let links: Vec<EventLink> = self.nodes[source]
                .links
                .read()
                .iter()
                .filter(|link| link.output == *output)
                .cloned()
                .collect();
            for link in links {
                let actor = self.resolve_actor(link.actor, user, &state.data).await;
                let event = PolicyEvent {
                    input: link.input.clone(),
                    output: link.output.clone(),
                    policy_id: self.policy.id.clone(),
                    source: self.nodes[source].uuid.clone(),
                    target: self.nodes[link.target].uuid.clone(),
                    user: actor,
                    data: state.data.clone(),
                    result: state.result.clone(),
                };
                // failures are reported by dispatch
                let _ = self.dispatch(link.target, event).await;
            }
        })
    }

    /// Deliver one event to its target handler.
    pub async fn dispatch(self: &Arc<Self>, target: usize, event: PolicyEvent) -> BlockResult<()> {
        let node = &self.nodes[target];
        let ctx = BlockContext::new(self, target);
        let user = event.user.clone();
        let forward = node
            .links
            .read()
            .iter()
            .any(|link| link.output == PolicyEventType::ErrorEvent)
            .then(|| EventState::from(event.data.clone()));

        debug!(
            policy_id = %self.policy.id,
            block = %node.uuid,
            input = %event.input,
            user = %user.did,
            "[pe-03] Handling event"
        );
        let result = match event.input {
            PolicyEventType::RunEvent => self.run(&ctx, event).await,
            PolicyEventType::RefreshEvent => node.behavior.refresh_action(&ctx, event).await,
            _ => node.behavior.handle_event(&ctx, event).await,
        };

        if let Err(err) = &result {
            self.report_error(target, &user, err).await;
            if let Some(state) = forward {
                self.trigger(target, &PolicyEventType::ErrorEvent, &user, state)
                    .await;
            }
        }
        result
    }

    /// Run wrapper: skip discontinued policies, advance the enclosing step
    /// container, then run the domain action.
    async fn run(self: &Arc<Self>, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        if self.is_discontinued() {
            debug!(policy_id = %self.policy.id, "[pe-03] Policy discontinued, run skipped");
            return Ok(());
        }
        let index = ctx.index();
        if let Some(parent) = self.nodes[index].parent {
            let parent_ctx = BlockContext::new(self, parent);
            self.nodes[parent]
                .behavior
                .change_step(&parent_ctx, &event.user, index)
                .await?;
        }
        self.nodes[index].behavior.run_action(ctx, event).await
    }

    /// Identity the target sees for a link's actor setting.
    async fn resolve_actor(
        &self,
        actor: EventActor,
        user: &PolicyUser,
        data: &EventData,
    ) -> PolicyUser {
        let did = match actor {
            EventActor::EventInitiator => None,
            EventActor::Owner => data.first_document().map(|doc| doc.owner.clone()),
            EventActor::Issuer => data.first_document().map(|doc| {
                doc.issuer()
                    .map_or_else(|| doc.owner.clone(), str::to_string)
            }),
        };
        match did {
            Some(did) if did != user.did => self.find_user(&did).await,
            _ => user.clone(),
        }
    }

    /// Registered user for a DID, or a user without a role.
    pub async fn find_user(&self, did: &str) -> PolicyUser {
        match self.services.roles.get_user(&self.policy.id, did).await {
            Ok(Some(user)) => user,
            Ok(None) => PolicyUser::new(did),
            Err(err) => {
                warn!(did, error = %err, "[pe-03] Role lookup failed");
                PolicyUser::new(did)
            }
        }
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    pub(crate) async fn report_error(&self, index: usize, user: &PolicyUser, err: &BlockActionError) {
        let node = &self.nodes[index];
        warn!(
            policy_id = %self.policy.id,
            block = %node.uuid,
            block_type = %node.block_type,
            user = %user.did,
            error = %err,
            "[pe-03] Block action failed"
        );
        self.services
            .notifier
            .publish(EngineEvent::BlockError {
                policy_id: self.policy.id.clone(),
                block_id: node.uuid.clone(),
                block_type: node.block_type.clone(),
                user: user.did.clone(),
                message: err.message.clone(),
            })
            .await;
    }

    /// Save state, then tell every user who can see the block to re-render.
    pub(crate) async fn update_block(&self, index: usize, user: &PolicyUser) {
        self.save_state(index).await;

        let node = &self.nodes[index];
        let owner = &self.policy.owner;
        let users = if node.option_bool("followUser") {
            vec![user.did.clone()]
        } else {
            let mut users = Vec::new();
            match self.services.roles.get_users(&self.policy.id).await {
                Ok(registered) => {
                    for u in registered {
                        if has_permission(&node.permissions, u.role.as_deref(), &u.did, owner)
                            && !users.contains(&u.did)
                        {
                            users.push(u.did);
                        }
                    }
                }
                Err(err) => warn!(error = %err, "[pe-03] Failed to list policy users"),
            }
            if self.has_permission(index, user) && !users.contains(&user.did) {
                users.push(user.did.clone());
            }
            if notifies_owner(&node.permissions) && !users.contains(owner) {
                users.push(owner.clone());
            }
            users
        };
        if users.is_empty() {
            return;
        }

        self.services
            .notifier
            .publish(EngineEvent::BlockUpdated {
                policy_id: self.policy.id.clone(),
                block_id: node.uuid.clone(),
                tag: node.tag.clone(),
                users,
            })
            .await;
    }

    pub(crate) async fn save_state(&self, index: usize) {
        let node = &self.nodes[index];
        let Some(state) = node.behavior.save_state() else {
            return;
        };
        if let Err(err) = self
            .services
            .states
            .save_state(&self.policy.id, &node.uuid, None, state)
            .await
        {
            warn!(
                policy_id = %self.policy.id,
                block = %node.uuid,
                error = %err,
                "[pe-03] Failed to save block state"
            );
        }
    }
}
