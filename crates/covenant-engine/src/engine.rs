use std::sync::Arc;

use covenant_audit::{AuditLog, StepStatus, TraceStep};
use covenant_consent::{ConsentCheck, ConsentManager};
use covenant_corridor::CorridorGate;
use covenant_ledger::SovereigntyLedger;
use covenant_registry::ContractRegistry;
use covenant_types::{
    Clock, Decision, DecisionResponse, OperationRequest, Outcome, Reason, ReasonCode, SystemClock,
};
use tracing::{info, warn};

use crate::context::{EvaluationContext, EvaluationState};
use crate::gates::{Gate, GateOutcome, GATE_SEQUENCE};
use crate::guard::{Checkpoint, ExecutionGuard};
use crate::{EngineConfig, EngineError};

/// Everything produced by one evaluation.
#[derive(Debug)]
pub struct Evaluation {
    pub decision: Decision,
    pub response: DecisionResponse,
    guard: Option<ExecutionGuard>,
}

impl Evaluation {
    pub fn outcome(&self) -> Outcome {
        self.decision.outcome
    }

    /// Present only for `Allow`.
    pub fn guard(&self) -> Option<&ExecutionGuard> {
        self.guard.as_ref()
    }

    pub fn into_guard(self) -> Option<ExecutionGuard> {
        self.guard
    }
}

/// Stateless coordinator over the enforcement components.
///
/// The engine owns no decision state of its own; all shared state lives in
/// the components it holds, each with its own synchronization.
pub struct OrchestrationEngine {
    pub(crate) ledger: Arc<SovereigntyLedger>,
    pub(crate) consent: Arc<ConsentManager>,
    pub(crate) corridors: Arc<CorridorGate>,
    pub(crate) registry: Arc<ContractRegistry>,
    pub(crate) audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
}

impl OrchestrationEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Decide on `request` and record the decision.
    ///
    /// An error means the decision could not be audited; callers must treat
    /// it as a denial.
    pub fn evaluate(&self, request: &OperationRequest) -> Result<Evaluation, EngineError> {
        let mut ctx = EvaluationContext::new(request, self.clock.now());
        info!(
            operation_id = %request.operation_id,
            operation_kind = %request.operation_kind,
            agent = %request.agent_id,
            "operation received"
        );

        let mut verdict: Option<(Outcome, Vec<Reason>)> = None;
        for gate in GATE_SEQUENCE {
            match gate.run(self, &mut ctx) {
                GateOutcome::Passed(detail) => {
                    ctx.record(gate.reached_state(), StepStatus::Passed, detail);
                }
                GateOutcome::NotApplicable => {
                    ctx.record(gate.reached_state(), StepStatus::NotApplicable, None);
                }
                GateOutcome::Failed(reason) => {
                    warn!(
                        gate = gate.name(),
                        operation_id = %request.operation_id,
                        code = ?reason.code,
                        message = %reason.message,
                        "gate denied operation"
                    );
                    ctx.record(
                        gate.reached_state(),
                        StepStatus::Failed,
                        Some(reason.message.clone()),
                    );
                    verdict = Some(self.settle_failure(&ctx, gate, reason));
                    break;
                }
                GateOutcome::Aborted(reason) => {
                    warn!(
                        gate = gate.name(),
                        operation_id = %request.operation_id,
                        message = %reason.message,
                        "gate observed abort"
                    );
                    ctx.record(
                        gate.reached_state(),
                        StepStatus::Aborted,
                        Some(reason.message.clone()),
                    );
                    verdict = Some((Outcome::Abort, vec![reason]));
                    break;
                }
            }
        }

        let (outcome, mut reasons) = verdict.unwrap_or((Outcome::Allow, Vec::new()));
        reasons.append(&mut ctx.advisories);
        ctx.record(
            EvaluationState::Decided,
            status_for(outcome),
            Some(outcome.to_string()),
        );

        let decision = Decision {
            operation_id: request.operation_id.clone(),
            agent_id: request.agent_id.clone(),
            operation_kind: request.operation_kind.clone(),
            outcome,
            reasons,
            evaluated_at: ctx.at,
        };
        // On error the context drops here and its reservations are released.
        let record = self.audit.append(decision.clone(), ctx.trace)?;
        let response = DecisionResponse::from_decision(&decision, record.sequence_no);
        if outcome == Outcome::Allow {
            for reservation in ctx.reservations {
                reservation.commit();
            }
        }

        info!(
            operation_id = %decision.operation_id,
            outcome = %decision.outcome,
            audit_sequence_no = record.sequence_no,
            "operation decided"
        );

        let guard = match outcome {
            Outcome::Allow => Some(ExecutionGuard::new(
                decision.operation_id.clone(),
                decision.agent_id.clone(),
                decision.operation_kind.clone(),
                ctx.handle,
            )),
            Outcome::Deny | Outcome::Abort => None,
        };

        Ok(Evaluation {
            decision,
            response,
            guard,
        })
    }

    /// Re-check an allowed operation before a side-effecting step.
    ///
    /// The first time an abort is observed it is recorded as an `Abort`
    /// decision; later calls return that same response.
    pub fn confirm(&self, guard: &ExecutionGuard) -> Result<Checkpoint, EngineError> {
        if !guard.is_aborted() {
            return Ok(Checkpoint::Proceed);
        }

        let response = guard.record_abort(|| {
            let at = self.clock.now();
            let decision = Decision {
                operation_id: guard.operation_id().clone(),
                agent_id: guard.agent_id().clone(),
                operation_kind: guard.operation_kind().clone(),
                outcome: Outcome::Abort,
                reasons: vec![Reason::new(
                    ReasonCode::AbortTriggered,
                    "abort observed at execution checkpoint",
                )],
                evaluated_at: at,
            };
            let trace = vec![
                TraceStep::new("execution_checkpoint", StepStatus::Aborted),
                TraceStep::new(EvaluationState::Decided.as_str(), StepStatus::Aborted)
                    .with_detail(Outcome::Abort.to_string()),
            ];
            let record = self.audit.append(decision.clone(), trace)?;
            warn!(
                operation_id = %decision.operation_id,
                audit_sequence_no = record.sequence_no,
                "in-flight operation aborted"
            );
            Ok(DecisionResponse::from_decision(&decision, record.sequence_no))
        })?;

        Ok(Checkpoint::Aborted(response))
    }

    pub fn ledger(&self) -> &Arc<SovereigntyLedger> {
        &self.ledger
    }

    pub fn consent(&self) -> &Arc<ConsentManager> {
        &self.consent
    }

    pub fn corridors(&self) -> &Arc<CorridorGate> {
        &self.corridors
    }

    pub fn registry(&self) -> &Arc<ContractRegistry> {
        &self.registry
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Turn a gate failure into the final verdict.
    ///
    /// Once the template is known to need consent, a triggered abort handle
    /// outranks any denial: the operation is halted, not merely refused.
    fn settle_failure(
        &self,
        ctx: &EvaluationContext<'_>,
        gate: Gate,
        reason: Reason,
    ) -> (Outcome, Vec<Reason>) {
        if !ctx.requires_consent() {
            return (Outcome::Deny, vec![reason]);
        }

        if ctx.abort_observed() {
            return (
                Outcome::Abort,
                vec![
                    Reason::new(ReasonCode::AbortTriggered, "relied-upon abort handle was triggered"),
                    reason,
                ],
            );
        }

        if gate == Gate::Ledger {
            let request = ctx.request;
            if let ConsentCheck::Triggered { grant } =
                self.consent
                    .check(&request.agent_id, &request.operation_kind, ctx.at)
            {
                return (
                    Outcome::Abort,
                    vec![
                        Reason::new(
                            ReasonCode::AbortTriggered,
                            format!("abort handle {} was triggered", grant.abort_handle_id),
                        ),
                        reason,
                    ],
                );
            }
        }

        (Outcome::Deny, vec![reason])
    }
}

fn status_for(outcome: Outcome) -> StepStatus {
    match outcome {
        Outcome::Allow => StepStatus::Passed,
        Outcome::Deny => StepStatus::Failed,
        Outcome::Abort => StepStatus::Aborted,
    }
}

/// Assembles an engine from shared components. Missing components are
/// created empty.
#[derive(Default)]
pub struct EngineBuilder {
    clock: Option<Arc<dyn Clock>>,
    ledger: Option<Arc<SovereigntyLedger>>,
    consent: Option<Arc<ConsentManager>>,
    corridors: Option<Arc<CorridorGate>>,
    registry: Option<Arc<ContractRegistry>>,
    audit: Option<Arc<AuditLog>>,
}

impl EngineBuilder {
    /// Corridors and templates from `config`; everything else empty.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let corridors = CorridorGate::new(config.corridors.iter().cloned(), config.high_impact_threshold)?;
        let registry = ContractRegistry::with_templates(config.templates.iter().cloned())?;
        Ok(Self::default()
            .corridors(Arc::new(corridors))
            .registry(Arc::new(registry)))
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ledger(mut self, ledger: Arc<SovereigntyLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn consent(mut self, consent: Arc<ConsentManager>) -> Self {
        self.consent = Some(consent);
        self
    }

    pub fn corridors(mut self, corridors: Arc<CorridorGate>) -> Self {
        self.corridors = Some(corridors);
        self
    }

    pub fn registry(mut self, registry: Arc<ContractRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> Result<OrchestrationEngine, EngineError> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let corridors = match self.corridors {
            Some(corridors) => corridors,
            None => Arc::new(CorridorGate::new(
                std::iter::empty(),
                EngineConfig::default().high_impact_threshold,
            )?),
        };
        Ok(OrchestrationEngine {
            ledger: self
                .ledger
                .unwrap_or_else(|| Arc::new(SovereigntyLedger::with_clock(clock.clone()))),
            consent: self
                .consent
                .unwrap_or_else(|| Arc::new(ConsentManager::with_clock(clock.clone()))),
            corridors,
            registry: self.registry.unwrap_or_default(),
            audit: self.audit.unwrap_or_default(),
            clock,
        })
    }
}
