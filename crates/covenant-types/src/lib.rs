//! Covenant Types - the shared vocabulary of the enforcement engine.
//!
//! Every other covenant crate speaks in these terms: who an agent is, what
//! it is entitled to, what it asks for, and what was decided.
#![deny(unsafe_code)]

mod agent;
mod capability;
mod clock;
mod corridor;
mod decision;
mod operation;

pub use agent::{Agent, AgentId, AgentKind};
pub use capability::{Capability, CapabilitySet};
pub use clock::{Clock, ManualClock, SystemClock};
pub use corridor::{CorridorId, CorridorImpact, CorridorKind, InvalidCorridorId};
pub use decision::{Decision, DecisionResponse, Outcome, Reason, ReasonCode};
pub use operation::{OperationChannels, OperationId, OperationKind, OperationRequest};
