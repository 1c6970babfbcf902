//! Covenant Engine - decides whether an operation on a represented agent
//! may proceed.
//!
//! For each request the engine walks a fixed sequence of gates:
//!
//! 1. **Template** - the operation kind must have a registered contract.
//! 2. **Ledger** - the agent's current baseline must hold every required
//!    capability, within bounds.
//! 3. **Consent** - a live grant must cover the operation, and its abort
//!    handle must not be triggered.
//! 4. **Corridor** - declared impacts must fit corridor capacity.
//!
//! Any failure decides the request at once; `Allow` requires every gate.
//! Every decision, whatever its outcome, is appended to the audit log
//! before it is returned.

#![deny(unsafe_code)]

pub mod config;
mod context;
mod engine;
mod error;
mod gates;
mod guard;
pub mod telemetry;

pub use config::{EngineConfig, LoggingConfig};
pub use context::EvaluationState;
pub use engine::{EngineBuilder, Evaluation, OrchestrationEngine};
pub use error::EngineError;
pub use gates::{Gate, GATE_SEQUENCE};
pub use guard::{Checkpoint, ExecutionAborted, ExecutionGuard};
