//! Host signals sampled by the scheduler before it decides anything.
//!
//! The activity gate reports whether the host is foregrounded (timers are
//! unreliable while it is suspended); the readiness gate reports whether the
//! representative-event target can receive an event yet.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Is the host currently active/foregrounded?
pub trait ActivityGate: Send {
    fn is_active(&self) -> bool;
}

/// Is the representative-event target ready to receive an event?
pub trait ReadinessGate: Send {
    fn is_ready(&self) -> bool;
}

/// A shared boolean signal. Clones observe the same value, so a host can
/// keep one clone and hand another to the scheduler.
#[derive(Debug, Clone)]
pub struct GateFlag {
    value: Arc<AtomicBool>,
}

impl GateFlag {
    #[must_use]
    pub fn new(initial: bool) -> Self {
        Self {
            value: Arc::new(AtomicBool::new(initial)),
        }
    }

    /// A flag that starts open (active / ready).
    #[must_use]
    pub fn open() -> Self {
        Self::new(true)
    }

    /// Set the flag. Returns the previous value.
    pub fn set(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::SeqCst)
    }

    #[must_use]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::SeqCst)
    }
}

impl Default for GateFlag {
    fn default() -> Self {
        Self::open()
    }
}

impl ActivityGate for GateFlag {
    fn is_active(&self) -> bool {
        self.get()
    }
}

impl ReadinessGate for GateFlag {
    fn is_ready(&self) -> bool {
        self.get()
    }
}
