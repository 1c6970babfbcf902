use std::ops::RangeInclusive;
use std::sync::Arc;

use covenant_types::Decision;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::{
    verify_chain, AuditError, AuditExport, AuditRecord, AuditStore, InMemoryAuditStore,
    TraceStep, GENESIS_HASH,
};

#[derive(Default)]
struct WriterState {
    /// First broken record seen by a verification or append.
    broken: Option<(u64, String)>,
}

/// The decision log. Appends are serialized through one writer lock.
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
    writer: Mutex<WriterState>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryAuditStore::new()))
    }

    pub fn with_store(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            writer: Mutex::new(WriterState::default()),
        }
    }

    /// Seal and store `decision` as the next record.
    pub fn append(
        &self,
        decision: Decision,
        trace: Vec<TraceStep>,
    ) -> Result<AuditRecord, AuditError> {
        let mut writer = self.writer.lock();
        if let Some((sequence_no, reason)) = &writer.broken {
            return Err(AuditError::ChainBroken {
                sequence_no: *sequence_no,
                reason: reason.clone(),
            });
        }

        let head = self.store.last()?;
        let (sequence_no, prev_hash) = match &head {
            None => (1, GENESIS_HASH),
            Some(head) => {
                // A tampered head would be silently sealed under a new record.
                if head.expected_hash()? != head.record_hash {
                    let reason = "head record hash mismatch".to_string();
                    error!(sequence_no = head.sequence_no, %reason, "audit chain broken; appends halted");
                    writer.broken = Some((head.sequence_no, reason.clone()));
                    return Err(AuditError::ChainBroken {
                        sequence_no: head.sequence_no,
                        reason,
                    });
                }
                (head.sequence_no + 1, head.record_hash)
            }
        };

        let record = AuditRecord::sealed(sequence_no, decision, trace, prev_hash)?;
        self.store.append(record.clone())?;
        debug!(
            sequence_no,
            operation_id = %record.decision.operation_id,
            outcome = %record.decision.outcome,
            "audit record appended"
        );
        Ok(record)
    }

    /// Recompute hashes over `range` and check every link, including the
    /// link from the record just before the range.
    ///
    /// A broken chain halts appends until [`resolve`](Self::resolve).
    pub fn verify(&self, range: RangeInclusive<u64>) -> Result<bool, AuditError> {
        let (from, to) = (*range.start(), *range.end());
        let len = self.store.len()?;
        if from == 0 || from > to || to > len {
            return Err(AuditError::InvalidRange { from, to, len });
        }

        let anchor = if from == 1 {
            GENESIS_HASH
        } else {
            match self.store.read_range(from - 1, from - 1)?.first() {
                Some(previous) => previous.record_hash,
                None => {
                    return Err(AuditError::Storage(format!(
                        "record {} missing from store",
                        from - 1
                    )))
                }
            }
        };

        let records = self.store.read_range(from, to)?;
        let outcome = verify_chain(&records, anchor);
        if outcome.valid && records.len() as u64 == to - from + 1 {
            debug!(from, to, "audit range verified");
            return Ok(true);
        }

        let sequence_no = outcome.first_invalid.unwrap_or(from);
        let reason = outcome
            .error_message
            .unwrap_or_else(|| "records missing from range".into());
        error!(sequence_no, %reason, "audit chain broken; appends halted");
        let mut writer = self.writer.lock();
        if writer.broken.is_none() {
            writer.broken = Some((sequence_no, reason));
        }
        Ok(false)
    }

    pub fn verify_all(&self) -> Result<bool, AuditError> {
        let len = self.store.len()?;
        if len == 0 {
            return Ok(true);
        }
        self.verify(1..=len)
    }

    /// Re-verify the whole chain and lift the halt if it is intact again.
    pub fn resolve(&self) -> Result<bool, AuditError> {
        let len = self.store.len()?;
        let records = self.store.read_range(1, len)?;
        let outcome = verify_chain(&records, GENESIS_HASH);

        let mut writer = self.writer.lock();
        if outcome.valid {
            if writer.broken.take().is_some() {
                info!(records = len, "audit chain verified; appends resumed");
            }
            return Ok(true);
        }
        if let Some(error) = outcome.into_error() {
            error!(%error, "audit chain still broken");
            if let AuditError::ChainBroken { sequence_no, reason } = error {
                writer.broken = Some((sequence_no, reason));
            }
        }
        Ok(false)
    }

    pub fn is_halted(&self) -> bool {
        self.writer.lock().broken.is_some()
    }

    pub fn records(&self, range: RangeInclusive<u64>) -> Result<Vec<AuditRecord>, AuditError> {
        self.store.read_range(*range.start(), *range.end())
    }

    pub fn export(&self, range: RangeInclusive<u64>) -> Result<Vec<AuditExport>, AuditError> {
        Ok(self
            .records(range)?
            .iter()
            .map(AuditRecord::export)
            .collect())
    }

    pub fn len(&self) -> Result<u64, AuditError> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool, AuditError> {
        self.store.is_empty()
    }

    /// Hash new records will link to.
    pub fn head_hash(&self) -> Result<[u8; 32], AuditError> {
        Ok(self
            .store
            .last()?
            .map_or(GENESIS_HASH, |record| record.record_hash))
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StepStatus;
    use chrono::{DateTime, Utc};
    use covenant_types::{AgentId, OperationId, OperationKind, Outcome, Reason, ReasonCode};
    use parking_lot::RwLock;
    use proptest::prelude::*;

    /// Store that lets a test rewrite history behind the log's back.
    #[derive(Default)]
    struct TamperableStore {
        records: RwLock<Vec<AuditRecord>>,
    }

    impl TamperableStore {
        fn tamper(&self, sequence_no: u64, f: impl FnOnce(&mut AuditRecord)) {
            let mut records = self.records.write();
            f(&mut records[(sequence_no - 1) as usize]);
        }
    }

    impl AuditStore for TamperableStore {
        fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
            self.records.write().push(record);
            Ok(())
        }

        fn last(&self) -> Result<Option<AuditRecord>, AuditError> {
            Ok(self.records.read().last().cloned())
        }

        fn read_range(&self, from: u64, to: u64) -> Result<Vec<AuditRecord>, AuditError> {
            Ok(self
                .records
                .read()
                .iter()
                .filter(|r| r.sequence_no >= from && r.sequence_no <= to)
                .cloned()
                .collect())
        }

        fn len(&self) -> Result<u64, AuditError> {
            Ok(self.records.read().len() as u64)
        }
    }

    fn decision(op: &str, outcome: Outcome) -> Decision {
        let reasons = match outcome {
            Outcome::Allow => vec![],
            _ => vec![Reason::new(ReasonCode::UnknownOperation, "no template")],
        };
        Decision {
            operation_id: OperationId::new(op),
            agent_id: AgentId::new("agent-1"),
            operation_kind: OperationKind::new("telemetry_export"),
            outcome,
            reasons,
            evaluated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn trace() -> Vec<TraceStep> {
        vec![TraceStep::new("template_resolved", StepStatus::Failed).with_detail("unknown")]
    }

    fn tamperable_log(n: u64) -> (Arc<TamperableStore>, AuditLog) {
        let store = Arc::new(TamperableStore::default());
        let log = AuditLog::with_store(store.clone());
        for i in 0..n {
            log.append(decision(&format!("op-{i}"), Outcome::Deny), trace())
                .unwrap();
        }
        (store, log)
    }

    #[test]
    fn test_sequence_is_gapless_and_linked() {
        let log = AuditLog::new();
        let first = log.append(decision("op-1", Outcome::Allow), vec![]).unwrap();
        let second = log.append(decision("op-2", Outcome::Deny), trace()).unwrap();

        assert_eq!(first.sequence_no, 1);
        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(second.sequence_no, 2);
        assert_eq!(second.prev_hash, first.record_hash);
        assert_eq!(log.head_hash().unwrap(), second.record_hash);
        assert!(log.verify_all().unwrap());
    }

    #[test]
    fn test_tampered_decision_fails_verification_and_halts() {
        let (store, log) = tamperable_log(5);
        assert!(log.verify(1..=5).unwrap());

        store.tamper(3, |record| record.decision.outcome = Outcome::Allow);

        assert!(log.verify(1..=2).unwrap());
        assert!(!log.verify(3..=5).unwrap());
        assert!(log.is_halted());

        let err = log
            .append(decision("op-late", Outcome::Deny), trace())
            .unwrap_err();
        assert!(err.is_integrity_violation());
        assert_eq!(log.len().unwrap(), 5);
    }

    #[test]
    fn test_tampered_trace_breaks_the_following_link() {
        let (store, log) = tamperable_log(3);
        store.tamper(2, |record| record.trace.clear());
        // Record 3 alone still hashes correctly but links to a bad record.
        assert!(log.verify(3..=3).unwrap());
        assert!(!log.verify(2..=3).unwrap());
    }

    #[test]
    fn test_tampered_head_halts_append() {
        let (store, log) = tamperable_log(2);
        store.tamper(2, |record| {
            record.decision.reasons.clear();
        });
        assert!(log.append(decision("op-3", Outcome::Deny), trace()).is_err());
        assert!(log.is_halted());
    }

    #[test]
    fn test_resolve_lifts_halt_only_when_chain_is_intact() {
        let (store, log) = tamperable_log(3);
        let original = store.records.read()[1].clone();
        store.tamper(2, |record| record.sequence_no = 9);
        assert!(!log.verify_all().unwrap());

        assert!(!log.resolve().unwrap());
        assert!(log.is_halted());

        store.tamper(2, |record| *record = original);
        assert!(log.resolve().unwrap());
        assert!(!log.is_halted());
        assert_eq!(
            log.append(decision("op-4", Outcome::Deny), trace())
                .unwrap()
                .sequence_no,
            4
        );
    }

    #[test]
    fn test_invalid_ranges() {
        let log = AuditLog::new();
        assert!(log.verify_all().unwrap());
        assert!(matches!(log.verify(1..=1), Err(AuditError::InvalidRange { .. })));
        log.append(decision("op-1", Outcome::Deny), trace()).unwrap();
        assert!(matches!(log.verify(0..=1), Err(AuditError::InvalidRange { .. })));
        assert!(matches!(log.verify(2..=1), Err(AuditError::InvalidRange { .. })));
    }

    #[test]
    fn test_export_is_hex_encoded() {
        let log = AuditLog::new();
        let record = log.append(decision("op-1", Outcome::Deny), trace()).unwrap();
        let exported = log.export(1..=1).unwrap();

        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].operation_id, OperationId::new("op-1"));
        assert_eq!(exported[0].record_hash, hex::encode(record.record_hash));
        assert_eq!(exported[0].prev_hash, "0".repeat(64));
    }

    #[test]
    fn test_concurrent_appends_form_one_chain() {
        let log = AuditLog::new();
        std::thread::scope(|s| {
            for worker in 0..8 {
                let log = &log;
                s.spawn(move || {
                    for i in 0..25 {
                        log.append(decision(&format!("w{worker}-{i}"), Outcome::Deny), trace())
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(log.len().unwrap(), 200);
        assert!(log.verify_all().unwrap());
    }

    proptest! {
        #[test]
        fn property_any_field_mutation_is_detected(
            count in 1u64..12,
            target in 0u64..12,
            mutation in 0u8..4,
        ) {
            let (store, log) = tamperable_log(count);
            let target = target % count + 1;
            store.tamper(target, |record| match mutation {
                0 => record.decision.outcome = Outcome::Abort,
                1 => record.decision.operation_id = OperationId::new("forged"),
                2 => record.trace.push(TraceStep::new("forged", StepStatus::Passed)),
                _ => record.prev_hash[0] ^= 0xff,
            });
            prop_assert!(!log.verify_all().unwrap());
        }
    }
}
