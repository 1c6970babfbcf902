//! Covenant Audit - tamper-evident decision log.
//!
//! Every decision is appended with a gap-free sequence number and a hash
//! that covers the decision, its evaluation trace and the previous record's
//! hash. The first record links to [`GENESIS_HASH`]. Mutating any stored
//! record breaks verification from that record onward.
//!
//! A failed verification halts appends until the chain verifies again.

#![deny(unsafe_code)]

mod error;
mod log;
mod record;
mod store;
mod verify;

pub use error::AuditError;
pub use log::AuditLog;
pub use record::{AuditExport, AuditRecord, StepStatus, TraceStep, GENESIS_HASH};
pub use store::{AuditStore, InMemoryAuditStore};
pub use verify::{verify_chain, ChainVerification};
