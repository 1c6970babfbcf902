use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, OperationId, OperationKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Allow,
    Deny,
    /// An abort handle the operation depends on has been triggered.
    Abort,
}

impl Outcome {
    pub fn allows_execution(&self) -> bool {
        matches!(self, Outcome::Allow)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Outcome::Allow => "allow",
            Outcome::Deny => "deny",
            Outcome::Abort => "abort",
        };
        f.write_str(label)
    }
}

/// Why a decision came out the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    UnknownOperation,
    InsufficientCapability,
    RollbackAttempt,
    NoValidConsent,
    OverlappingGrant,
    CorridorOverload,
    DuplicateTemplate,
    AuditChainBroken,
    AbortTriggered,
    ImpactUnavailable,
    UnknownCorridor,
    NeurorightsViolation,
    /// High-severity impact on a corridor whose communities have not
    /// granted FPIC.
    FpicNotGranted,
    /// Soft threshold crossed by a low-severity operation.
    CorridorAdvisory,
}

impl ReasonCode {
    pub fn is_blocking(&self) -> bool {
        !matches!(self, ReasonCode::CorridorAdvisory)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub code: ReasonCode,
    pub message: String,
}

impl Reason {
    pub fn new(code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// The immutable verdict on one operation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub operation_id: OperationId,
    pub agent_id: AgentId,
    pub operation_kind: OperationKind,
    pub outcome: Outcome,
    pub reasons: Vec<Reason>,
    pub evaluated_at: DateTime<Utc>,
}

impl Decision {
    pub fn has_reason(&self, code: ReasonCode) -> bool {
        self.reasons.iter().any(|reason| reason.code == code)
    }

    pub fn blocking_reasons(&self) -> impl Iterator<Item = &Reason> {
        self.reasons.iter().filter(|reason| reason.code.is_blocking())
    }
}

/// What the caller receives back for a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub operation_id: OperationId,
    pub outcome: Outcome,
    pub reasons: Vec<Reason>,
    pub audit_sequence_no: u64,
}

impl DecisionResponse {
    pub fn from_decision(decision: &Decision, audit_sequence_no: u64) -> Self {
        Self {
            operation_id: decision.operation_id.clone(),
            outcome: decision.outcome,
            reasons: decision.reasons.clone(),
            audit_sequence_no,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_is_the_only_non_blocking_code() {
        assert!(!ReasonCode::CorridorAdvisory.is_blocking());
        assert!(ReasonCode::CorridorOverload.is_blocking());
        assert!(ReasonCode::AbortTriggered.is_blocking());
    }

    #[test]
    fn reason_codes_serialize_snake_case() {
        let json = serde_json::to_string(&ReasonCode::InsufficientCapability).unwrap();
        assert_eq!(json, "\"insufficient_capability\"");
    }

    #[test]
    fn response_mirrors_decision() {
        let decision = Decision {
            operation_id: OperationId::new("op-1"),
            agent_id: AgentId::new("a"),
            operation_kind: OperationKind::new("read"),
            outcome: Outcome::Deny,
            reasons: vec![Reason::new(ReasonCode::UnknownOperation, "no template")],
            evaluated_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let response = DecisionResponse::from_decision(&decision, 7);
        assert_eq!(response.audit_sequence_no, 7);
        assert_eq!(response.outcome, Outcome::Deny);
        assert!(decision.has_reason(ReasonCode::UnknownOperation));
        assert_eq!(decision.blocking_reasons().count(), 1);
    }
}
