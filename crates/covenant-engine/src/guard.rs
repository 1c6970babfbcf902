use covenant_consent::AbortHandle;
use covenant_types::{AgentId, DecisionResponse, OperationId, OperationKind};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("operation {0} aborted before its next step")]
pub struct ExecutionAborted(pub OperationId);

/// Result of an audited execution checkpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Checkpoint {
    Proceed,
    /// The abort was recorded in the audit log under this response.
    Aborted(DecisionResponse),
}

impl Checkpoint {
    pub fn may_proceed(&self) -> bool {
        matches!(self, Checkpoint::Proceed)
    }
}

/// Handed out with every `Allow`. Side-effecting steps of the operation go
/// through it so a later abort stops them.
#[derive(Debug)]
pub struct ExecutionGuard {
    operation_id: OperationId,
    agent_id: AgentId,
    operation_kind: OperationKind,
    handle: Option<AbortHandle>,
    abort_record: Mutex<Option<DecisionResponse>>,
}

impl ExecutionGuard {
    pub(crate) fn new(
        operation_id: OperationId,
        agent_id: AgentId,
        operation_kind: OperationKind,
        handle: Option<AbortHandle>,
    ) -> Self {
        Self {
            operation_id,
            agent_id,
            operation_kind,
            handle,
            abort_record: Mutex::new(None),
        }
    }

    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn operation_kind(&self) -> &OperationKind {
        &self.operation_kind
    }

    /// Operations allowed without consent have no handle and never abort.
    pub fn is_aborted(&self) -> bool {
        self.handle.as_ref().map_or(false, AbortHandle::is_triggered)
    }

    pub fn checkpoint(&self) -> Result<(), ExecutionAborted> {
        if self.is_aborted() {
            return Err(ExecutionAborted(self.operation_id.clone()));
        }
        Ok(())
    }

    /// Run `step` only if no abort has been signaled.
    pub fn commit<T>(&self, step: impl FnOnce() -> T) -> Result<T, ExecutionAborted> {
        self.checkpoint()?;
        Ok(step())
    }

    /// Store the audited abort unless one was stored already; returns the
    /// response that stays on record.
    pub(crate) fn record_abort(
        &self,
        record: impl FnOnce() -> Result<DecisionResponse, crate::EngineError>,
    ) -> Result<DecisionResponse, crate::EngineError> {
        let mut slot = self.abort_record.lock();
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }
        let response = record()?;
        *slot = Some(response.clone());
        Ok(response)
    }
}
