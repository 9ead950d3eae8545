//! Scheduler background loop.
//!
//! Spawns a tokio task that exclusively owns the [`AnchorScheduler`],
//! applies [`SchedulerCommand`]s in arrival order, and sleeps until the
//! pending wake. Every mutation therefore happens on one logical thread.

use crate::clock::EpochMillis;
use crate::error::{PiggyError, Result};
use crate::scheduler::anchor::{AnchorScheduler, SchedulerSnapshot};
use crate::scheduler::event::{EventController, EventTicket, RepresentativeEvent};
use crate::scheduler::wake::WakeId;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Requests accepted by the runner.
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Manual "catch up now".
    CatchUp,
    Pause,
    Resume,
    Toggle,
    Reset,
    /// New amount per period, as a decimal.
    SetAmount(f64),
    /// New period, in seconds.
    SetPeriodSecs(f64),
    SetSoundOn(bool),
    /// Host activity flipped. The gate itself must already reflect it.
    ActivityChanged(bool),
    /// Event target readiness flipped. The gate itself must already reflect it.
    ReadinessChanged(bool),
    /// The controller finished playing an event.
    EventCompleted(EventTicket),
    /// Reply with a snapshot.
    Snapshot(oneshot::Sender<SchedulerSnapshot>),
    /// Stop the loop.
    Shutdown,
}

/// Cloneable sender side of the runner's command queue.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerCommand>,
}

/// Receiver side of the runner's command queue, consumed by
/// [`SchedulerRunner::new`].
#[derive(Debug)]
pub struct SchedulerInbox {
    rx: mpsc::UnboundedReceiver<SchedulerCommand>,
}

/// Create the command queue.
///
/// The handle exists before the scheduler so that an event controller can
/// hold a clone for reporting completions.
#[must_use]
pub fn command_channel() -> (SchedulerHandle, SchedulerInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SchedulerHandle { tx }, SchedulerInbox { rx })
}

impl SchedulerHandle {
    /// Queue a command.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Channel`] once the runner has stopped.
    pub fn send(&self, command: SchedulerCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|e| PiggyError::Channel(format!("scheduler stopped: {e}")))
    }

    pub fn catch_up(&self) -> Result<()> {
        self.send(SchedulerCommand::CatchUp)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(SchedulerCommand::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(SchedulerCommand::Resume)
    }

    pub fn toggle(&self) -> Result<()> {
        self.send(SchedulerCommand::Toggle)
    }

    pub fn reset(&self) -> Result<()> {
        self.send(SchedulerCommand::Reset)
    }

    pub fn complete(&self, ticket: EventTicket) -> Result<()> {
        self.send(SchedulerCommand::EventCompleted(ticket))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SchedulerCommand::Shutdown)
    }

    /// Ask the runner for a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Channel`] if the runner stops before replying.
    pub async fn snapshot(&self) -> Result<SchedulerSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SchedulerCommand::Snapshot(reply_tx))?;
        reply_rx
            .await
            .map_err(|e| PiggyError::Channel(format!("snapshot reply dropped: {e}")))
    }
}

/// Drives an [`AnchorScheduler`] on a tokio task.
pub struct SchedulerRunner {
    scheduler: AnchorScheduler,
    inbox: SchedulerInbox,
}

enum Step {
    Command(Option<SchedulerCommand>),
    Wake(WakeId),
}

impl SchedulerRunner {
    #[must_use]
    pub fn new(scheduler: AnchorScheduler, inbox: SchedulerInbox) -> Self {
        Self { scheduler, inbox }
    }

    /// Start the loop on a new tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until a [`SchedulerCommand::Shutdown`] arrives or every handle is
    /// dropped.
    ///
    /// A [`TimedEventController`] owned by the scheduler keeps a handle of
    /// its own, so with one installed only `Shutdown` stops the loop.
    pub async fn run(mut self) {
        info!(
            balance = %self.scheduler.balance(),
            anchor = self.scheduler.anchor(),
            "scheduler runner started"
        );
        self.scheduler.recompute();

        loop {
            let wake = self
                .scheduler
                .pending_wake()
                .map(|wake| (wake.id, self.deadline_for(wake.at)));

            let sleeper = async move {
                match wake {
                    Some((_, deadline)) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let step = tokio::select! {
                command = self.inbox.rx.recv() => Step::Command(command),
                () = sleeper => match wake {
                    Some((id, _)) => Step::Wake(id),
                    None => continue,
                },
            };

            match step {
                Step::Command(None) => {
                    info!("all scheduler handles dropped, stopping");
                    break;
                }
                Step::Command(Some(SchedulerCommand::Shutdown)) => {
                    info!("scheduler shutdown requested");
                    break;
                }
                Step::Command(Some(command)) => self.dispatch(command),
                Step::Wake(id) => {
                    self.scheduler.fire_wake(id);
                }
            }
        }
    }

    /// Map a wall-clock deadline onto the tokio timer.
    fn deadline_for(&self, at: EpochMillis) -> Instant {
        let delay_ms = at.saturating_sub(self.scheduler.now_millis()).max(0);
        Instant::now() + Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0))
    }

    fn dispatch(&mut self, command: SchedulerCommand) {
        debug!(?command, "scheduler command");
        match command {
            SchedulerCommand::CatchUp => self.scheduler.catch_up(),
            SchedulerCommand::Pause => self.scheduler.pause(),
            SchedulerCommand::Resume => self.scheduler.resume(),
            SchedulerCommand::Toggle => {
                self.scheduler.toggle_running();
            }
            SchedulerCommand::Reset => self.scheduler.reset(),
            SchedulerCommand::SetAmount(amount) => {
                if let Err(e) = self.scheduler.set_amount_decimal(amount) {
                    warn!("amount update rejected: {e}");
                }
            }
            SchedulerCommand::SetPeriodSecs(secs) => {
                if let Err(e) = self.scheduler.set_period_secs(secs) {
                    warn!("period update rejected: {e}");
                }
            }
            SchedulerCommand::SetSoundOn(on) => self.scheduler.set_sound_on(on),
            SchedulerCommand::ActivityChanged(active) => self.scheduler.activity_changed(active),
            SchedulerCommand::ReadinessChanged(ready) => self.scheduler.readiness_changed(ready),
            SchedulerCommand::EventCompleted(ticket) => {
                if let Err(e) = self.scheduler.complete_event(ticket) {
                    error!("rejecting event completion: {e}");
                }
            }
            SchedulerCommand::Snapshot(reply) => {
                if reply.send(self.scheduler.snapshot()).is_err() {
                    debug!("snapshot requester went away");
                }
            }
            SchedulerCommand::Shutdown => {}
        }
    }
}

/// Plays each representative event as a timer of its `play_for` length and
/// reports completion through a [`SchedulerHandle`].
///
/// Must be used from inside a tokio runtime.
pub struct TimedEventController {
    handle: SchedulerHandle,
    playing: Option<(EventTicket, JoinHandle<()>)>,
}

impl TimedEventController {
    #[must_use]
    pub fn new(handle: SchedulerHandle) -> Self {
        Self {
            handle,
            playing: None,
        }
    }

    /// Ticket of the event whose timer is still running, if any.
    #[must_use]
    pub fn playing(&self) -> Option<EventTicket> {
        self.playing
            .as_ref()
            .filter(|(_, task)| !task.is_finished())
            .map(|(ticket, _)| *ticket)
    }
}

impl EventController for TimedEventController {
    fn start(&mut self, event: RepresentativeEvent) {
        if let Some((previous, task)) = self.playing.take() {
            // A finished timer has already reported its completion.
            if !task.is_finished() {
                warn!(%previous, "starting a new event while one was still playing");
                task.abort();
            }
        }

        let handle = self.handle.clone();
        let ticket = event.ticket;
        let play_for = event.play_for;
        let task = tokio::spawn(async move {
            tokio::time::sleep(play_for).await;
            if let Err(e) = handle.complete(ticket) {
                debug!(%ticket, "cannot report event completion: {e}");
            }
        });
        self.playing = Some((ticket, task));
    }

    fn cancel(&mut self, ticket: EventTicket) {
        match self.playing.take() {
            Some((playing, task)) if playing == ticket => task.abort(),
            other => self.playing = other,
        }
    }
}

impl Drop for TimedEventController {
    fn drop(&mut self) {
        if let Some((_, task)) = self.playing.take() {
            task.abort();
        }
    }
}
