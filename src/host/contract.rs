//! Versioned command/event envelopes for driving the piggy bank from a host.

use serde::{Deserialize, Serialize};

/// Contract version for host command/event envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Commands a host can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "host.version")]
    HostVersion,
    #[serde(rename = "host.activity")]
    HostActivity,
    #[serde(rename = "host.readiness")]
    HostReadiness,
    #[serde(rename = "bank.status")]
    BankStatus,
    #[serde(rename = "bank.pause")]
    BankPause,
    #[serde(rename = "bank.resume")]
    BankResume,
    #[serde(rename = "bank.toggle")]
    BankToggle,
    #[serde(rename = "bank.reset")]
    BankReset,
    #[serde(rename = "bank.catch_up")]
    BankCatchUp,
    #[serde(rename = "bank.set_amount")]
    BankSetAmount,
    #[serde(rename = "bank.set_period")]
    BankSetPeriod,
    #[serde(rename = "bank.set_sound")]
    BankSetSound,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
}

impl CommandName {
    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::HostVersion => "host.version",
            Self::HostActivity => "host.activity",
            Self::HostReadiness => "host.readiness",
            Self::BankStatus => "bank.status",
            Self::BankPause => "bank.pause",
            Self::BankResume => "bank.resume",
            Self::BankToggle => "bank.toggle",
            Self::BankReset => "bank.reset",
            Self::BankCatchUp => "bank.catch_up",
            Self::BankSetAmount => "bank.set_amount",
            Self::BankSetPeriod => "bank.set_period",
            Self::BankSetSound => "bank.set_sound",
            Self::RuntimeStop => "runtime.stop",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "host.ping" => Some(Self::HostPing),
            "host.version" => Some(Self::HostVersion),
            "host.activity" => Some(Self::HostActivity),
            "host.readiness" => Some(Self::HostReadiness),
            "bank.status" => Some(Self::BankStatus),
            "bank.pause" => Some(Self::BankPause),
            "bank.resume" => Some(Self::BankResume),
            "bank.toggle" => Some(Self::BankToggle),
            "bank.reset" => Some(Self::BankReset),
            "bank.catch_up" => Some(Self::BankCatchUp),
            "bank.set_amount" => Some(Self::BankSetAmount),
            "bank.set_period" => Some(Self::BankSetPeriod),
            "bank.set_sound" => Some(Self::BankSetSound),
            "runtime.stop" => Some(Self::RuntimeStop),
            _ => None,
        }
    }
}

/// A versioned response envelope from bank -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// A versioned command envelope from host -> bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    ///
    /// # Errors
    ///
    /// Returns a [`ContractError`] for an unknown version or empty request id.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A versioned event envelope from bank -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            event_id: event_id.into(),
            event: event.into(),
            payload,
        }
    }
}

/// Why an envelope was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
}

/// Envelope validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}
