use std::sync::Arc;

use chrono::{DateTime, Utc};
use covenant_audit::{StepStatus, TraceStep};
use covenant_consent::AbortHandle;
use covenant_corridor::Reservation;
use covenant_registry::ContractTemplate;
use covenant_types::{OperationRequest, Reason};
use serde::{Deserialize, Serialize};

/// Where an evaluation stands. States only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationState {
    Received,
    TemplateResolved,
    LedgerChecked,
    ConsentChecked,
    CorridorChecked,
    Decided,
}

impl EvaluationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationState::Received => "received",
            EvaluationState::TemplateResolved => "template_resolved",
            EvaluationState::LedgerChecked => "ledger_checked",
            EvaluationState::ConsentChecked => "consent_checked",
            EvaluationState::CorridorChecked => "corridor_checked",
            EvaluationState::Decided => "decided",
        }
    }
}

impl std::fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state threaded through the gates for one request.
pub(crate) struct EvaluationContext<'r> {
    pub request: &'r OperationRequest,
    pub at: DateTime<Utc>,
    pub state: EvaluationState,
    pub template: Option<Arc<ContractTemplate>>,
    /// Abort token of the grant the consent gate relied on.
    pub handle: Option<AbortHandle>,
    /// Corridor capacity held for this request. Committed only once the
    /// decision is on record; released when the context is dropped.
    pub reservations: Vec<Reservation>,
    pub advisories: Vec<Reason>,
    pub trace: Vec<TraceStep>,
}

impl<'r> EvaluationContext<'r> {
    pub fn new(request: &'r OperationRequest, at: DateTime<Utc>) -> Self {
        Self {
            request,
            at,
            state: EvaluationState::Received,
            template: None,
            handle: None,
            reservations: Vec::new(),
            advisories: Vec::new(),
            trace: vec![TraceStep::new(EvaluationState::Received.as_str(), StepStatus::Passed)],
        }
    }

    pub fn record(&mut self, state: EvaluationState, status: StepStatus, detail: Option<String>) {
        debug_assert!(state >= self.state);
        self.state = state;
        let step = TraceStep::new(state.as_str(), status);
        self.trace.push(match detail {
            Some(detail) => step.with_detail(detail),
            None => step,
        });
    }

    pub fn requires_consent(&self) -> bool {
        self.template.as_ref().map_or(false, |t| t.requires_consent)
    }

    pub fn abort_observed(&self) -> bool {
        self.handle.as_ref().map_or(false, AbortHandle::is_triggered)
    }
}
