//! The anchor scheduler core.
//!
//! `anchor` is the wall-clock instant up to which every period has been
//! credited. Each decision compares it with the current time, credits all
//! but the newest due period silently, and hands the newest one to the
//! [`EventController`] as a representative event. The event's completion
//! credits that last period and asks for the next decision.

use crate::clock::{Clock, EpochMillis, duration_millis};
use crate::config::{PiggyConfig, period_from_secs, validate_period};
use crate::error::{PiggyError, Result};
use crate::gates::{ActivityGate, ReadinessGate};
use crate::money::Cents;
use crate::scheduler::event::{
    EventCompletion, EventController, EventTicket, RepresentativeEvent,
};
use crate::scheduler::notice::SchedulerNotice;
use crate::scheduler::wake::{PendingWake, WakeId, WakeReason, WakeSlot};
use crate::store::{PersistedState, StateStore};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

mod control;

/// External collaborators owned by the scheduler.
pub struct SchedulerParts {
    pub clock: Box<dyn Clock>,
    pub store: Box<dyn StateStore>,
    pub activity: Box<dyn ActivityGate>,
    pub readiness: Box<dyn ReadinessGate>,
    pub events: Box<dyn EventController>,
}

/// Logical scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    /// Not running; the anchor is frozen.
    Paused,
    /// Zeroed by a reset, waiting for the event target before running again.
    Restarting,
    /// Running, waiting for the next period boundary.
    Idle,
    /// Running, one representative event outstanding.
    Armed,
}

/// Point-in-time view for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub balance: Cents,
    /// Balance formatted with two decimals.
    pub balance_display: String,
    pub anchor: EpochMillis,
    pub running: bool,
    pub phase: SchedulerPhase,
    pub amount: Cents,
    pub period_ms: u64,
    pub sound_on: bool,
    pub in_flight: Option<EventTicket>,
    pub next_wake: Option<PendingWake>,
}

/// Owns balance, anchor and the single-flight guard.
pub struct AnchorScheduler {
    balance: Cents,
    anchor: EpochMillis,
    running: bool,
    /// Set by reset until the event target is ready again.
    restart_pending: bool,
    in_flight: Option<EventTicket>,
    /// Highest ticket number handed out so far.
    last_ticket: u64,
    amount: Cents,
    period: Duration,
    /// Play length override; `None` plays each event for one period.
    event_length: Option<Duration>,
    sound_on: bool,
    inactive_retry: Duration,
    readiness_retry: Duration,
    wake: WakeSlot,
    clock: Box<dyn Clock>,
    store: Box<dyn StateStore>,
    activity: Box<dyn ActivityGate>,
    readiness: Box<dyn ReadinessGate>,
    events: Box<dyn EventController>,
    notice_tx: Option<mpsc::UnboundedSender<SchedulerNotice>>,
}

impl AnchorScheduler {
    /// Build a running scheduler, loading balance and anchor from the store.
    ///
    /// Nothing is decided until the first [`recompute`](Self::recompute).
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Config`] when the configured amount, period or
    /// event length is invalid.
    pub fn new(config: &PiggyConfig, parts: SchedulerParts) -> Result<Self> {
        let amount = config.schedule.amount_cents()?;
        let period = config.schedule.period()?;
        let event_length = config.presentation.event_duration()?;

        let SchedulerParts {
            clock,
            store,
            activity,
            readiness,
            events,
        } = parts;

        let now = clock.now_millis();
        let state = PersistedState::load(store.as_ref(), now);
        info!(
            balance = %state.balance,
            anchor = state.anchor,
            %amount,
            ?period,
            "anchor scheduler loaded"
        );

        Ok(Self {
            balance: state.balance,
            anchor: state.anchor,
            running: true,
            restart_pending: false,
            in_flight: None,
            last_ticket: 0,
            amount,
            period,
            event_length,
            sound_on: config.presentation.sound_on,
            inactive_retry: config.retry.inactive_retry(),
            readiness_retry: config.retry.readiness_retry(),
            wake: WakeSlot::default(),
            clock,
            store,
            activity,
            readiness,
            events,
            notice_tx: None,
        })
    }

    /// Publish [`SchedulerNotice`]s on `tx`.
    #[must_use]
    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<SchedulerNotice>) -> Self {
        self.notice_tx = Some(tx);
        self
    }

    pub fn balance(&self) -> Cents {
        self.balance
    }

    pub fn anchor(&self) -> EpochMillis {
        self.anchor
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ticket of the outstanding representative event, if any.
    pub fn in_flight(&self) -> Option<EventTicket> {
        self.in_flight
    }

    pub fn amount(&self) -> Cents {
        self.amount
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn sound_on(&self) -> bool {
        self.sound_on
    }

    pub fn pending_wake(&self) -> Option<PendingWake> {
        self.wake.pending()
    }

    /// Current time on the scheduler's clock.
    pub fn now_millis(&self) -> EpochMillis {
        self.clock.now_millis()
    }

    pub fn phase(&self) -> SchedulerPhase {
        if self.restart_pending {
            SchedulerPhase::Restarting
        } else if !self.running {
            SchedulerPhase::Paused
        } else if self.in_flight.is_some() {
            SchedulerPhase::Armed
        } else {
            SchedulerPhase::Idle
        }
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            balance: self.balance,
            balance_display: self.balance.to_string(),
            anchor: self.anchor,
            running: self.running,
            phase: self.phase(),
            amount: self.amount,
            period_ms: u64::try_from(self.period.as_millis()).unwrap_or(u64::MAX),
            sound_on: self.sound_on,
            in_flight: self.in_flight,
            next_wake: self.wake.pending(),
        }
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Change the amount credited per period. Applies to every later credit,
    /// including the completion of an event already in flight.
    pub fn set_amount(&mut self, amount: Cents) {
        debug!(%amount, "amount changed");
        self.amount = amount;
        self.recompute();
    }

    /// Decimal form of [`set_amount`](Self::set_amount).
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Config`] for negative or non-finite amounts; the
    /// previous amount is kept.
    pub fn set_amount_decimal(&mut self, amount: f64) -> Result<()> {
        let cents = Cents::from_decimal(amount)?;
        self.set_amount(cents);
        Ok(())
    }

    /// Change the period. The next decision uses the new value against the
    /// existing anchor.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Config`] for periods under one millisecond; the
    /// previous period is kept.
    pub fn set_period(&mut self, period: Duration) -> Result<()> {
        if let Err(e) = validate_period(period) {
            warn!("rejecting period update, keeping {:?}: {e}", self.period);
            return Err(e);
        }
        debug!(?period, "period changed");
        self.period = period;
        self.recompute();
        Ok(())
    }

    /// Seconds form of [`set_period`](Self::set_period).
    ///
    /// # Errors
    ///
    /// Same as [`set_period`](Self::set_period).
    pub fn set_period_secs(&mut self, secs: f64) -> Result<()> {
        let period = period_from_secs(secs).inspect_err(|e| {
            warn!("rejecting period update, keeping {:?}: {e}", self.period);
        })?;
        self.set_period(period)
    }

    pub fn set_sound_on(&mut self, sound_on: bool) {
        self.sound_on = sound_on;
        self.recompute();
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    /// Manual "catch up now" request.
    pub fn catch_up(&mut self) {
        self.drive();
    }

    /// The host's activity state flipped. Becoming active drops any slow
    /// inactive retry and decides immediately.
    pub fn activity_changed(&mut self, active: bool) {
        if !active {
            debug!("host became inactive");
            return;
        }
        debug!("host became active, recomputing");
        self.wake.cancel();
        self.drive();
    }

    /// The event target's readiness changed.
    pub fn readiness_changed(&mut self, ready: bool) {
        debug!(ready, "readiness changed");
        self.drive();
    }

    /// A wake timer fired. Returns `false` when `id` was replaced or
    /// cancelled in the meantime and the call was ignored.
    pub fn fire_wake(&mut self, id: WakeId) -> bool {
        let Some(wake) = self.wake.take_if_current(id) else {
            debug!(?id, "ignoring stale wake");
            return false;
        };
        debug!(reason = ?wake.reason, at = wake.at, "wake fired");
        self.drive();
        true
    }

    fn drive(&mut self) {
        if self.restart_pending {
            self.try_finish_restart();
        } else {
            self.recompute();
        }
    }

    /// Decide what to do now: nothing, arm a wake, or credit backlog and arm
    /// one representative event.
    ///
    /// Safe to call from any trigger at any time; calling it again with no
    /// time elapsed and no signal change has no further effect.
    pub fn recompute(&mut self) {
        if !self.running {
            return;
        }

        let now = self.clock.now_millis();

        if !self.activity.is_active() {
            self.arm_wake(
                now.saturating_add(duration_millis(self.inactive_retry)),
                WakeReason::InactiveRetry,
            );
            return;
        }

        if self.in_flight.is_some() {
            return;
        }

        if !self.readiness.is_ready() {
            self.arm_wake(
                now.saturating_add(duration_millis(self.readiness_retry)),
                WakeReason::ReadinessRetry,
            );
            return;
        }

        let period_ms = self.period_millis();
        // A clock that moved backwards yields zero elapsed, never negative.
        let elapsed = now.saturating_sub(self.anchor).max(0);
        let due = u64::try_from(elapsed / period_ms).unwrap_or(0);

        if due == 0 {
            self.arm_wake(self.anchor.saturating_add(period_ms), WakeReason::Boundary);
            return;
        }

        if due >= 2 {
            let periods = due - 1;
            let credited = self.credit(periods);
            info!(periods, %credited, balance = %self.balance, "credited backlog silently");
            self.notify(SchedulerNotice::BacklogCredited { periods, credited });
        }

        self.arm_event();
    }

    /// Report that the representative event `ticket` finished.
    ///
    /// Credits its period and makes the next decision. Completions for
    /// events that pause or reset already discarded are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Contract`] for a ticket this scheduler never
    /// issued.
    pub fn complete_event(&mut self, ticket: EventTicket) -> Result<EventCompletion> {
        if ticket.0 == 0 || ticket.0 > self.last_ticket {
            error!(%ticket, "completion for an event that was never started");
            return Err(PiggyError::Contract(format!(
                "event {ticket} was never started"
            )));
        }

        if self.in_flight != Some(ticket) {
            debug!(%ticket, "ignoring completion of a discarded event");
            return Ok(EventCompletion::Stale);
        }

        self.in_flight = None;
        let credited = self.credit(1);
        debug!(%ticket, %credited, balance = %self.balance, "representative event completed");
        self.notify(SchedulerNotice::EventCompleted { ticket });

        self.recompute();
        Ok(EventCompletion::Credited)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn arm_event(&mut self) {
        // Nothing needs waking while the event plays; its completion decides next.
        self.wake.cancel();

        self.last_ticket += 1;
        let ticket = EventTicket(self.last_ticket);
        self.in_flight = Some(ticket);

        let event = RepresentativeEvent {
            ticket,
            amount: self.amount,
            play_for: self.event_length.unwrap_or(self.period),
            sound_on: self.sound_on,
        };
        debug!(%ticket, amount = %event.amount, "starting representative event");
        self.notify(SchedulerNotice::EventStarted {
            ticket,
            amount: event.amount,
            sound_on: event.sound_on,
        });
        self.events.start(event);
    }

    /// Credit `periods` periods at the current amount and advance the anchor
    /// past them. Returns the amount added.
    fn credit(&mut self, periods: u64) -> Cents {
        let credited = self.amount.saturating_mul(periods);
        self.balance = self.balance.saturating_add(credited);
        let advance = self
            .period_millis()
            .saturating_mul(i64::try_from(periods).unwrap_or(i64::MAX));
        self.anchor = self.anchor.saturating_add(advance);
        self.persist();
        credited
    }

    /// Discard the outstanding event without crediting it.
    fn cancel_in_flight(&mut self) {
        if let Some(ticket) = self.in_flight.take() {
            debug!(%ticket, "cancelling representative event");
            self.events.cancel(ticket);
            self.notify(SchedulerNotice::EventCancelled { ticket });
        }
    }

    fn period_millis(&self) -> EpochMillis {
        duration_millis(self.period).max(1)
    }

    fn arm_wake(&mut self, at: EpochMillis, reason: WakeReason) {
        let wake = self.wake.arm(at, reason);
        debug!(reason = ?wake.reason, at = wake.at, "wake armed");
    }

    /// Write balance and anchor through to the store and announce them.
    fn persist(&mut self) {
        let state = PersistedState {
            balance: self.balance,
            anchor: self.anchor,
        };
        if let Err(e) = state.save(self.store.as_mut()) {
            warn!("cannot persist scheduler state: {e}");
        }
        self.notify(SchedulerNotice::BalanceChanged {
            balance: self.balance,
            anchor: self.anchor,
        });
    }

    fn notify(&self, notice: SchedulerNotice) {
        let Some(tx) = &self.notice_tx else {
            return;
        };
        if tx.send(notice).is_err() {
            debug!("notice receiver dropped");
        }
    }
}
