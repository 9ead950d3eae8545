//! Notices emitted as the scheduler changes state.

use crate::clock::EpochMillis;
use crate::money::Cents;
use crate::scheduler::event::EventTicket;
use serde::{Deserialize, Serialize};

/// Observable scheduler transitions, for hosts that render or log them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulerNotice {
    /// Balance or anchor changed.
    BalanceChanged { balance: Cents, anchor: EpochMillis },
    /// Missed periods were credited without a visible effect.
    BacklogCredited { periods: u64, credited: Cents },
    /// A representative event was armed.
    EventStarted {
        ticket: EventTicket,
        amount: Cents,
        sound_on: bool,
    },
    /// A representative event finished and its period was credited.
    EventCompleted { ticket: EventTicket },
    /// A representative event was discarded without credit.
    EventCancelled { ticket: EventTicket },
    Paused { anchor: EpochMillis },
    Resumed { anchor: EpochMillis },
    /// Balance zeroed; a restart is pending on readiness.
    Reset { anchor: EpochMillis },
    /// Running again after a reset.
    Restarted { anchor: EpochMillis },
}

impl SchedulerNotice {
    /// Short wire name, e.g. `"balance_changed"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BalanceChanged { .. } => "balance_changed",
            Self::BacklogCredited { .. } => "backlog_credited",
            Self::EventStarted { .. } => "event_started",
            Self::EventCompleted { .. } => "event_completed",
            Self::EventCancelled { .. } => "event_cancelled",
            Self::Paused { .. } => "paused",
            Self::Resumed { .. } => "resumed",
            Self::Reset { .. } => "reset",
            Self::Restarted { .. } => "restarted",
        }
    }
}
