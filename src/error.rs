//! Error types for the piggy scheduler.

/// Top-level error type for the reward scheduler.
#[derive(Debug, thiserror::Error)]
pub enum PiggyError {
    /// Configuration error (invalid period, amount, or unreadable config file).
    #[error("config error: {0}")]
    Config(String),

    /// Durable state store error (read, parse, or write).
    #[error("store error: {0}")]
    Store(String),

    /// A collaborator broke the scheduler contract (e.g. completing an event
    /// that was never started).
    #[error("contract violation: {0}")]
    Contract(String),

    /// Malformed or rejected host bridge command.
    #[error("host command error: {0}")]
    Host(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PiggyError>;
