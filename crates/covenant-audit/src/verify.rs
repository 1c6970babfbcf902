use serde::{Deserialize, Serialize};

use crate::{AuditError, AuditRecord};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub total_records: u64,
    pub verified_records: u64,
    pub first_invalid: Option<u64>,
    pub error_message: Option<String>,
}

impl ChainVerification {
    fn broken(total: u64, verified: u64, sequence_no: u64, reason: String) -> Self {
        Self {
            valid: false,
            total_records: total,
            verified_records: verified,
            first_invalid: Some(sequence_no),
            error_message: Some(reason),
        }
    }

    pub fn into_error(self) -> Option<AuditError> {
        match (self.valid, self.first_invalid) {
            (false, Some(sequence_no)) => Some(AuditError::ChainBroken {
                sequence_no,
                reason: self.error_message.unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

/// Check that `records` form an unbroken chain starting after `anchor`.
///
/// `anchor` is the hash the first record must link to: the genesis hash
/// for a chain starting at sequence 1, otherwise the preceding record's hash.
pub fn verify_chain(records: &[AuditRecord], anchor: [u8; 32]) -> ChainVerification {
    let total = records.len() as u64;
    let mut expected_prev = anchor;
    let mut expected_seq = records.first().map_or(1, |r| r.sequence_no);

    for (verified, record) in records.iter().enumerate() {
        let verified = verified as u64;
        if record.sequence_no != expected_seq {
            return ChainVerification::broken(
                total,
                verified,
                record.sequence_no,
                format!("expected sequence {expected_seq}, found {}", record.sequence_no),
            );
        }
        if record.prev_hash != expected_prev {
            return ChainVerification::broken(
                total,
                verified,
                record.sequence_no,
                "previous hash link mismatch".into(),
            );
        }
        match record.expected_hash() {
            Ok(hash) if hash == record.record_hash => {}
            Ok(_) => {
                return ChainVerification::broken(
                    total,
                    verified,
                    record.sequence_no,
                    "record hash mismatch".into(),
                )
            }
            Err(error) => {
                return ChainVerification::broken(
                    total,
                    verified,
                    record.sequence_no,
                    error.to_string(),
                )
            }
        }
        expected_prev = record.record_hash;
        expected_seq += 1;
    }

    ChainVerification {
        valid: true,
        total_records: total,
        verified_records: total,
        first_invalid: None,
        error_message: None,
    }
}
