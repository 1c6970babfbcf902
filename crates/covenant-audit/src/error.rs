use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit chain broken at sequence {sequence_no}: {reason}")]
    ChainBroken { sequence_no: u64, reason: String },

    #[error("invalid audit range {from}..={to} (log holds {len} records)")]
    InvalidRange { from: u64, to: u64, len: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl AuditError {
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, AuditError::ChainBroken { .. })
    }
}
