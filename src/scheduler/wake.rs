//! The single pending wake.

use crate::clock::EpochMillis;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why a wake was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeReason {
    /// Next period boundary (`anchor + period`).
    Boundary,
    /// Host inactive; check again later.
    InactiveRetry,
    /// Event target not ready; check again shortly.
    ReadinessRetry,
    /// Reset waiting for the event target before restarting.
    ResetPoll,
}

/// Identifies one armed wake so a late timer for a replaced wake can be
/// recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WakeId(u64);

/// A scheduled future call into the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWake {
    pub id: WakeId,
    /// Wall-clock instant the wake is due.
    pub at: EpochMillis,
    pub reason: WakeReason,
}

/// Holds at most one [`PendingWake`]. Arming replaces whatever was pending.
#[derive(Debug, Default)]
pub(crate) struct WakeSlot {
    pending: Option<PendingWake>,
    next_id: u64,
}

impl WakeSlot {
    /// Arm a wake at `at`, replacing any pending one.
    ///
    /// Re-arming the identical deadline and reason keeps the existing wake.
    pub(crate) fn arm(&mut self, at: EpochMillis, reason: WakeReason) -> PendingWake {
        if let Some(existing) = self.pending.filter(|w| w.at == at && w.reason == reason) {
            return existing;
        }

        self.next_id = self.next_id.wrapping_add(1);
        let wake = PendingWake {
            id: WakeId(self.next_id),
            at,
            reason,
        };
        if let Some(replaced) = self.pending.replace(wake) {
            debug!(?replaced, ?wake, "replacing pending wake");
        }
        wake
    }

    pub(crate) fn cancel(&mut self) -> Option<PendingWake> {
        self.pending.take()
    }

    pub(crate) fn pending(&self) -> Option<PendingWake> {
        self.pending
    }

    /// Consume the pending wake if `id` is still the current one.
    pub(crate) fn take_if_current(&mut self, id: WakeId) -> Option<PendingWake> {
        match self.pending {
            Some(wake) if wake.id == id => self.pending.take(),
            _ => None,
        }
    }
}
