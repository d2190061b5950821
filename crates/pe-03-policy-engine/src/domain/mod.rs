//! Domain layer: the block contract, events, permissions and schedules.

pub mod block;
pub mod event;
pub mod permissions;
pub mod schedule;

pub use block::{BlockResult, BlockRole, PolicyBlock, SourceQuery};
pub use event::{EventData, EventLink, EventState, ImplicitLink, PolicyEvent};
pub use permissions::{has_permission, notifies_owner};
pub use schedule::{Period, PeriodUnit, Schedule};
