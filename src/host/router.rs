//! Routes host command envelopes onto a running scheduler.

use crate::clock::Clock;
use crate::config::{PiggyConfig, period_from_secs};
use crate::error::{PiggyError, Result};
use crate::gates::GateFlag;
use crate::host::contract::{
    CommandEnvelope, CommandName, EVENT_VERSION, EventEnvelope, ResponseEnvelope,
};
use crate::money::Cents;
use crate::scheduler::{
    AnchorScheduler, SchedulerCommand, SchedulerHandle, SchedulerNotice, SchedulerParts,
    SchedulerRunner, TimedEventController, command_channel,
};
use crate::store::StateStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// A scheduler running on its own task, plus the host-side plumbing to
/// drive it.
pub struct BankHost {
    pub router: BankRouter,
    pub notices: mpsc::UnboundedReceiver<SchedulerNotice>,
    pub runner: JoinHandle<()>,
}

impl BankHost {
    /// Build the scheduler with open gates and a timed event controller,
    /// then spawn its runner.
    ///
    /// Must be called from inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Config`] if the configuration is invalid.
    pub fn start(
        config: &PiggyConfig,
        clock: Box<dyn Clock>,
        store: Box<dyn StateStore>,
    ) -> Result<Self> {
        let (handle, inbox) = command_channel();
        let activity = GateFlag::open();
        let readiness = GateFlag::open();
        let parts = SchedulerParts {
            clock,
            store,
            activity: Box::new(activity.clone()),
            readiness: Box::new(readiness.clone()),
            events: Box::new(TimedEventController::new(handle.clone())),
        };

        let (notice_tx, notices) = mpsc::unbounded_channel();
        let scheduler = AnchorScheduler::new(config, parts)?.with_notices(notice_tx);
        let runner = SchedulerRunner::new(scheduler, inbox).spawn();

        Ok(Self {
            router: BankRouter::new(handle, activity, readiness),
            notices,
            runner,
        })
    }
}

/// Translates [`CommandEnvelope`]s into scheduler commands.
///
/// Gate commands update the shared [`GateFlag`]s before notifying the
/// scheduler, so the scheduler reads the new value when it re-evaluates.
#[derive(Debug, Clone)]
pub struct BankRouter {
    handle: SchedulerHandle,
    activity: GateFlag,
    readiness: GateFlag,
}

impl BankRouter {
    #[must_use]
    pub fn new(handle: SchedulerHandle, activity: GateFlag, readiness: GateFlag) -> Self {
        Self {
            handle,
            activity,
            readiness,
        }
    }

    #[must_use]
    pub fn handle(&self) -> &SchedulerHandle {
        &self.handle
    }

    /// Route one command and build its response.
    ///
    /// Commands that change scheduler state reply with the snapshot taken
    /// right after the change was applied.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Host`] for a malformed payload and
    /// [`PiggyError::Channel`] once the scheduler has stopped.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        match envelope.command {
            CommandName::HostPing => Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                serde_json::json!({"pong": true}),
            )),
            CommandName::HostVersion => Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                serde_json::json!({
                    "contract_version": EVENT_VERSION,
                    "package_version": env!("CARGO_PKG_VERSION"),
                }),
            )),
            CommandName::HostActivity => self.handle_activity(envelope).await,
            CommandName::HostReadiness => self.handle_readiness(envelope).await,
            CommandName::BankStatus => self.reply_with_snapshot(envelope).await,
            CommandName::BankPause => self.apply(envelope, SchedulerCommand::Pause).await,
            CommandName::BankResume => self.apply(envelope, SchedulerCommand::Resume).await,
            CommandName::BankToggle => self.apply(envelope, SchedulerCommand::Toggle).await,
            CommandName::BankReset => self.apply(envelope, SchedulerCommand::Reset).await,
            CommandName::BankCatchUp => self.apply(envelope, SchedulerCommand::CatchUp).await,
            CommandName::BankSetAmount => {
                let amount = parse_amount(&envelope.payload)?;
                self.apply(envelope, SchedulerCommand::SetAmount(amount)).await
            }
            CommandName::BankSetPeriod => {
                let secs = parse_period_secs(&envelope.payload)?;
                self.apply(envelope, SchedulerCommand::SetPeriodSecs(secs))
                    .await
            }
            CommandName::BankSetSound => {
                let on = parse_bool_field(&envelope.payload, "on", "bank.set_sound")?;
                self.apply(envelope, SchedulerCommand::SetSoundOn(on)).await
            }
            CommandName::RuntimeStop => self.handle_runtime_stop(envelope),
        }
    }

    async fn handle_activity(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let active = parse_bool_field(&envelope.payload, "active", "host.activity")?;
        if self.activity.set(active) != active {
            info!(active, "host activity changed");
        }
        self.apply(envelope, SchedulerCommand::ActivityChanged(active))
            .await
    }

    async fn handle_readiness(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let ready = parse_bool_field(&envelope.payload, "ready", "host.readiness")?;
        if self.readiness.set(ready) != ready {
            info!(ready, "event target readiness changed");
        }
        self.apply(envelope, SchedulerCommand::ReadinessChanged(ready))
            .await
    }

    fn handle_runtime_stop(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        self.handle.shutdown()?;
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"stopping": true}),
        ))
    }

    async fn apply(
        &self,
        envelope: &CommandEnvelope,
        command: SchedulerCommand,
    ) -> Result<ResponseEnvelope> {
        self.handle.send(command)?;
        self.reply_with_snapshot(envelope).await
    }

    async fn reply_with_snapshot(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let snapshot = self.handle.snapshot().await?;
        let payload = serde_json::to_value(&snapshot)
            .map_err(|e| PiggyError::Host(format!("failed to serialize snapshot: {e}")))?;
        Ok(ResponseEnvelope::ok(envelope.request_id.clone(), payload))
    }
}

/// Wrap a scheduler notice as a `bank.*` event envelope.
///
/// # Errors
///
/// Returns [`PiggyError::Host`] if the notice cannot be serialized.
pub fn notice_envelope(notice: &SchedulerNotice) -> Result<EventEnvelope> {
    let payload = serde_json::to_value(notice)
        .map_err(|e| PiggyError::Host(format!("failed to serialize notice: {e}")))?;
    Ok(EventEnvelope::new(
        uuid::Uuid::new_v4().to_string(),
        format!("bank.{}", notice.name()),
        payload,
    ))
}

fn parse_bool_field(payload: &serde_json::Value, field: &str, command: &str) -> Result<bool> {
    let Some(value) = payload.get(field).and_then(serde_json::Value::as_bool) else {
        return Err(PiggyError::Host(format!(
            "{command} requires payload.{field} (boolean)"
        )));
    };
    Ok(value)
}

/// Accepts a JSON number or a decimal string such as `"0.50"`.
fn parse_amount(payload: &serde_json::Value) -> Result<f64> {
    let amount = match payload.get("amount") {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(amount) = amount else {
        return Err(PiggyError::Host(
            "bank.set_amount requires payload.amount (number or decimal string)".to_owned(),
        ));
    };
    Cents::from_decimal(amount).map_err(|e| PiggyError::Host(e.to_string()))?;
    Ok(amount)
}

fn parse_period_secs(payload: &serde_json::Value) -> Result<f64> {
    let Some(secs) = payload.get("secs").and_then(serde_json::Value::as_f64) else {
        return Err(PiggyError::Host(
            "bank.set_period requires payload.secs (number)".to_owned(),
        ));
    };
    period_from_secs(secs).map_err(|e| PiggyError::Host(e.to_string()))?;
    Ok(secs)
}
