//! Covenant Ledger - the sovereignty ledger.
//!
//! Each agent owns an append-only history of capability baselines. A new
//! baseline is accepted only when it is a superset of the current one, so
//! a right once granted is never withdrawn through this path. Rejected
//! proposals leave no trace in the history and are surfaced as
//! [`SovereigntyError::RollbackAttempt`].
//!
//! Writes are serialized per agent. Readers always see a complete baseline.

#![deny(unsafe_code)]

mod error;
mod ledger;

pub use error::SovereigntyError;
pub use ledger::{SovereigntyBaseline, SovereigntyLedger};
