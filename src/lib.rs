//! Piggy: a wall-clock-anchored reward scheduler.
//!
//! A fixed amount is credited to a persistent balance once per period. The
//! schedule is anchored to wall-clock time, so periods missed while the
//! process slept, lagged or was closed are credited on the next evaluation.
//!
//! # Architecture
//!
//! - **Scheduler**: [`AnchorScheduler`] owns balance, anchor and the
//!   single-flight guard; a [`SchedulerRunner`] drives it on a tokio task
//! - **Collaborators**: clock, state store, activity and readiness gates,
//!   and the representative-event controller are injected as traits
//! - **Host bridge**: newline-delimited JSON commands and events over
//!   stdin/stdout (`piggy-host` binary)

pub mod clock;
pub mod config;
pub mod error;
pub mod gates;
pub mod host;
pub mod money;
pub mod scheduler;
pub mod store;


pub use clock::{Clock, EpochMillis, ManualClock, SystemClock};
pub use config::PiggyConfig;
pub use error::{PiggyError, Result};
pub use gates::{ActivityGate, GateFlag, ReadinessGate};
pub use money::Cents;
pub use scheduler::{
    AnchorScheduler, EventController, SchedulerHandle, SchedulerNotice, SchedulerParts,
    SchedulerRunner, SchedulerSnapshot,
};
pub use store::{JsonFileStore, MemoryStore, StateStore};
