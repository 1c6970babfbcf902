use covenant_types::{Decision, OperationId, Outcome, Reason};
use serde::{Deserialize, Serialize};

use crate::AuditError;

/// `prev_hash` of the first record.
pub const GENESIS_HASH: [u8; 32] = [0; 32];

const RECORD_DOMAIN: &[u8] = b"covenant-audit-record-v1:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    NotApplicable,
    Advisory,
    Failed,
    Aborted,
}

/// One stage of an evaluation as it happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub stage: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TraceStep {
    pub fn new(stage: impl Into<String>, status: StepStatus) -> Self {
        Self {
            stage: stage.into(),
            status,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub sequence_no: u64,
    pub decision: Decision,
    pub trace: Vec<TraceStep>,
    pub prev_hash: [u8; 32],
    pub record_hash: [u8; 32],
}

#[derive(Serialize)]
struct HashInput<'a> {
    sequence_no: u64,
    decision: &'a Decision,
    trace: &'a [TraceStep],
    prev_hash: &'a [u8; 32],
}

impl AuditRecord {
    pub(crate) fn sealed(
        sequence_no: u64,
        decision: Decision,
        trace: Vec<TraceStep>,
        prev_hash: [u8; 32],
    ) -> Result<Self, AuditError> {
        let record_hash = compute_hash(sequence_no, &decision, &trace, &prev_hash)?;
        Ok(Self {
            sequence_no,
            decision,
            trace,
            prev_hash,
            record_hash,
        })
    }

    /// Hash this record should carry given its current contents.
    pub fn expected_hash(&self) -> Result<[u8; 32], AuditError> {
        compute_hash(self.sequence_no, &self.decision, &self.trace, &self.prev_hash)
    }

    pub fn export(&self) -> AuditExport {
        AuditExport {
            sequence_no: self.sequence_no,
            operation_id: self.decision.operation_id.clone(),
            outcome: self.decision.outcome,
            reasons: self.decision.reasons.clone(),
            record_hash: hex::encode(self.record_hash),
            prev_hash: hex::encode(self.prev_hash),
        }
    }
}

fn compute_hash(
    sequence_no: u64,
    decision: &Decision,
    trace: &[TraceStep],
    prev_hash: &[u8; 32],
) -> Result<[u8; 32], AuditError> {
    let encoded = serde_json::to_vec(&HashInput {
        sequence_no,
        decision,
        trace,
        prev_hash,
    })
    .map_err(|error| AuditError::Serialization(error.to_string()))?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(RECORD_DOMAIN);
    hasher.update(&encoded);
    Ok(*hasher.finalize().as_bytes())
}

/// Read-only view handed to external auditors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditExport {
    pub sequence_no: u64,
    pub operation_id: OperationId,
    pub outcome: Outcome,
    pub reasons: Vec<Reason>,
    pub record_hash: String,
    pub prev_hash: String,
}
