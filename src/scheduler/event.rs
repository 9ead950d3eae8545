//! Representative events: the one visible effect per shown period.

use crate::money::Cents;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifies one started representative event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTicket(pub(crate) u64);

impl EventTicket {
    /// Raw ticket number, for wire formats.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Rebuild a ticket received over a wire format.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for EventTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the controller is asked to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentativeEvent {
    pub ticket: EventTicket,
    /// Amount that will be credited when the event completes.
    pub amount: Cents,
    /// How long the effect should play.
    #[serde(with = "duration_millis")]
    pub play_for: Duration,
    /// Opaque presentation flag.
    pub sound_on: bool,
}

/// Starts and cancels the visible effect.
///
/// The scheduler calls `start` at most once without an intervening `cancel`
/// or completion. Completion must be reported later, through
/// [`AnchorScheduler::complete_event`](super::AnchorScheduler::complete_event)
/// (or a [`SchedulerCommand::EventCompleted`](super::SchedulerCommand)), never
/// from inside `start`.
pub trait EventController: Send {
    fn start(&mut self, event: RepresentativeEvent);
    fn cancel(&mut self, ticket: EventTicket);
}

/// Result of reporting a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCompletion {
    /// The period was credited.
    Credited,
    /// The event had already been cancelled by pause or reset; nothing was
    /// credited.
    Stale,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
