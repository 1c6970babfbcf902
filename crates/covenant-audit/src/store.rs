use parking_lot::RwLock;

use crate::{AuditError, AuditRecord};

/// Append-only storage for audit records.
///
/// Implementations must keep records in append order and never rewrite
/// one. Sequencing and hashing are done by [`AuditLog`](crate::AuditLog).
pub trait AuditStore: Send + Sync {
    fn append(&self, record: AuditRecord) -> Result<(), AuditError>;

    fn last(&self) -> Result<Option<AuditRecord>, AuditError>;

    /// Records with `from <= sequence_no <= to`, in order.
    fn read_range(&self, from: u64, to: u64) -> Result<Vec<AuditRecord>, AuditError>;

    fn len(&self) -> Result<u64, AuditError>;

    fn is_empty(&self) -> Result<bool, AuditError> {
        Ok(self.len()? == 0)
    }
}

/// Volatile store backed by a vector.
#[derive(Default)]
pub struct InMemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut records = self.records.write();
        let expected = records.len() as u64 + 1;
        if record.sequence_no != expected {
            return Err(AuditError::Storage(format!(
                "out of order append: expected sequence {expected}, got {}",
                record.sequence_no
            )));
        }
        records.push(record);
        Ok(())
    }

    fn last(&self) -> Result<Option<AuditRecord>, AuditError> {
        Ok(self.records.read().last().cloned())
    }

    fn read_range(&self, from: u64, to: u64) -> Result<Vec<AuditRecord>, AuditError> {
        let records = self.records.read();
        if from == 0 || from > to {
            return Ok(Vec::new());
        }
        let start = (from - 1) as usize;
        let end = (to as usize).min(records.len());
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(records[start..end].to_vec())
    }

    fn len(&self) -> Result<u64, AuditError> {
        Ok(self.records.read().len() as u64)
    }
}
