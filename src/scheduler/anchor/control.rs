//! Pause, resume and reset.
//!
//! Each of these cancels the pending wake and discards any in-flight event
//! before touching the anchor, so nothing scheduled earlier can credit
//! against the new state.

use super::AnchorScheduler;
use crate::clock::duration_millis;
use crate::money::Cents;
use crate::scheduler::notice::SchedulerNotice;
use crate::scheduler::wake::WakeReason;
use tracing::{debug, info};

impl AnchorScheduler {
    /// Freeze the scheduler at the current instant.
    ///
    /// The in-flight event (if any) is dropped without credit and the anchor
    /// moves to now, so the paused stretch never turns into backlog. A
    /// pending post-reset restart is abandoned.
    pub fn pause(&mut self) {
        if !self.running && !self.restart_pending {
            debug!("pause ignored, already paused");
            return;
        }

        self.wake.cancel();
        self.cancel_in_flight();
        self.restart_pending = false;
        self.running = false;
        self.anchor = self.clock.now_millis();
        self.persist();

        info!(anchor = self.anchor, "scheduler paused");
        self.notify(SchedulerNotice::Paused {
            anchor: self.anchor,
        });
    }

    /// Start again from now. Time spent paused is forfeited.
    pub fn resume(&mut self) {
        if self.running {
            debug!("resume ignored, already running");
            return;
        }

        self.wake.cancel();
        self.restart_pending = false;
        self.anchor = self.clock.now_millis();
        self.running = true;
        self.persist();

        info!(anchor = self.anchor, "scheduler resumed");
        self.notify(SchedulerNotice::Resumed {
            anchor: self.anchor,
        });
        self.recompute();
    }

    /// Pause when running, resume otherwise. Returns the new running state.
    pub fn toggle_running(&mut self) -> bool {
        if self.running {
            self.pause();
        } else {
            self.resume();
        }
        self.running
    }

    /// Zero the balance and restart cleanly.
    ///
    /// The scheduler stays stopped until the readiness gate reports ready
    /// (polled every readiness retry interval), then re-stamps the anchor at
    /// that moment, so a slow target never produces backlog.
    pub fn reset(&mut self) {
        self.wake.cancel();
        self.cancel_in_flight();
        self.running = false;
        self.balance = Cents::ZERO;
        self.anchor = self.clock.now_millis();
        self.persist();

        info!(anchor = self.anchor, "scheduler reset");
        self.notify(SchedulerNotice::Reset {
            anchor: self.anchor,
        });

        self.restart_pending = true;
        self.try_finish_restart();
    }

    /// Finish a pending reset if the event target is ready, otherwise poll
    /// again after the readiness retry interval.
    pub(super) fn try_finish_restart(&mut self) {
        if !self.restart_pending {
            return;
        }

        let now = self.clock.now_millis();
        if !self.readiness.is_ready() {
            debug!("reset waiting for readiness");
            self.arm_wake(
                now.saturating_add(duration_millis(self.readiness_retry)),
                WakeReason::ResetPoll,
            );
            return;
        }

        self.wake.cancel();
        self.restart_pending = false;
        self.anchor = now;
        self.running = true;
        self.persist();

        info!(anchor = self.anchor, "scheduler restarted after reset");
        self.notify(SchedulerNotice::Restarted {
            anchor: self.anchor,
        });
        self.recompute();
    }
}
