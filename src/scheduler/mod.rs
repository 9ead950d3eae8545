//! Anchor scheduler.
//!
//! Accrues a balance once per period against a wall-clock anchor, credits
//! missed periods silently, and shows at most one period at a time through
//! a representative event. All state changes go through
//! [`AnchorScheduler::recompute`]; [`runner::SchedulerRunner`] drives it on a
//! single tokio task.

pub mod anchor;
pub mod event;
pub mod notice;
pub mod runner;
pub mod wake;

pub use anchor::{AnchorScheduler, SchedulerParts, SchedulerPhase, SchedulerSnapshot};
pub use event::{EventCompletion, EventController, EventTicket, RepresentativeEvent};
pub use notice::SchedulerNotice;
pub use runner::{
    SchedulerCommand, SchedulerHandle, SchedulerInbox, SchedulerRunner, TimedEventController,
    command_channel,
};
pub use wake::{PendingWake, WakeId, WakeReason};
