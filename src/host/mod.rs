//! Host-facing command bridge: JSON envelopes in, scheduler notices out.

pub mod contract;
pub mod router;
pub mod stdio;

pub use router::{BankHost, BankRouter};
