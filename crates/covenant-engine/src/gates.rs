use covenant_consent::ConsentCheck;
use covenant_corridor::{Admission, CorridorError, CorridorVerdict, Reservation};
use covenant_ledger::SovereigntyError;
use covenant_registry::RegistryError;
use covenant_types::{Reason, ReasonCode};
use tracing::debug;

use crate::context::{EvaluationContext, EvaluationState};
use crate::OrchestrationEngine;

/// The checks an operation can be subject to, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    Template,
    Ledger,
    Consent,
    Corridor,
}

/// Every evaluation visits these gates in this order until one fails.
pub const GATE_SEQUENCE: [Gate; 4] = [Gate::Template, Gate::Ledger, Gate::Consent, Gate::Corridor];

pub(crate) enum GateOutcome {
    Passed(Option<String>),
    /// The template does not ask for this check.
    NotApplicable,
    Failed(Reason),
    Aborted(Reason),
}

impl Gate {
    pub fn name(&self) -> &'static str {
        match self {
            Gate::Template => "template",
            Gate::Ledger => "ledger",
            Gate::Consent => "consent",
            Gate::Corridor => "corridor",
        }
    }

    /// State an evaluation is in once this gate has run.
    pub fn reached_state(&self) -> EvaluationState {
        match self {
            Gate::Template => EvaluationState::TemplateResolved,
            Gate::Ledger => EvaluationState::LedgerChecked,
            Gate::Consent => EvaluationState::ConsentChecked,
            Gate::Corridor => EvaluationState::CorridorChecked,
        }
    }

    pub(crate) fn run(&self, engine: &OrchestrationEngine, ctx: &mut EvaluationContext<'_>) -> GateOutcome {
        debug!(
            gate = self.name(),
            operation_id = %ctx.request.operation_id,
            "evaluating gate"
        );
        match self {
            Gate::Template => resolve_template(engine, ctx),
            Gate::Ledger => check_ledger(engine, ctx),
            Gate::Consent => check_consent(engine, ctx),
            Gate::Corridor => check_corridors(engine, ctx),
        }
    }
}

fn resolve_template(engine: &OrchestrationEngine, ctx: &mut EvaluationContext<'_>) -> GateOutcome {
    let kind = &ctx.request.operation_kind;
    match engine.registry.lookup(kind) {
        Ok(template) => {
            ctx.template = Some(template);
            GateOutcome::Passed(None)
        }
        Err(RegistryError::UnknownOperation(_)) => GateOutcome::Failed(Reason::new(
            ReasonCode::UnknownOperation,
            format!("no contract template registered for {kind}"),
        )),
        Err(error) => GateOutcome::Failed(Reason::new(
            ReasonCode::UnknownOperation,
            format!("contract for {kind} unavailable: {error}"),
        )),
    }
}

fn check_ledger(engine: &OrchestrationEngine, ctx: &mut EvaluationContext<'_>) -> GateOutcome {
    let agent_id = &ctx.request.agent_id;
    let baseline = match engine.ledger.current(agent_id) {
        Ok(baseline) => baseline,
        Err(SovereigntyError::UnknownAgent(_)) => {
            return GateOutcome::Failed(Reason::new(
                ReasonCode::InsufficientCapability,
                format!("agent {agent_id} has no recorded baseline"),
            ))
        }
        Err(error) => {
            return GateOutcome::Failed(Reason::new(
                ReasonCode::InsufficientCapability,
                format!("baseline for {agent_id} unavailable: {error}"),
            ))
        }
    };

    let Some(template) = ctx.template.as_ref() else {
        return GateOutcome::Failed(Reason::new(
            ReasonCode::UnknownOperation,
            "ledger check reached without a resolved template",
        ));
    };

    let missing: Vec<&str> = template
        .required_capabilities
        .iter()
        .map(String::as_str)
        .filter(|name| !baseline.capabilities.contains(name))
        .collect();
    if !missing.is_empty() {
        return GateOutcome::Failed(Reason::new(
            ReasonCode::InsufficientCapability,
            format!(
                "baseline v{} lacks required capabilities: {}",
                baseline.version,
                missing.join(", ")
            ),
        ));
    }

    for (name, level) in &ctx.request.requested_capabilities_context {
        match baseline.capabilities.get(name) {
            Some(capability) if capability.permits_level(*level) => {}
            Some(capability) => {
                return GateOutcome::Failed(Reason::new(
                    ReasonCode::InsufficientCapability,
                    format!(
                        "requested {name} level {level} exceeds bound {:?}",
                        capability.bound
                    ),
                ))
            }
            None => {
                return GateOutcome::Failed(Reason::new(
                    ReasonCode::InsufficientCapability,
                    format!("requested level for {name}, which baseline v{} does not grant", baseline.version),
                ))
            }
        }
    }

    GateOutcome::Passed(Some(format!("baseline v{}", baseline.version)))
}

fn check_consent(engine: &OrchestrationEngine, ctx: &mut EvaluationContext<'_>) -> GateOutcome {
    if !ctx.requires_consent() {
        return GateOutcome::NotApplicable;
    }

    let request = ctx.request;
    match engine
        .consent
        .check(&request.agent_id, &request.operation_kind, ctx.at)
    {
        ConsentCheck::Authorized { grant, handle } => {
            ctx.handle = Some(handle);
            GateOutcome::Passed(Some(format!("grant {}", grant.abort_handle_id)))
        }
        ConsentCheck::Triggered { grant } => GateOutcome::Aborted(Reason::new(
            ReasonCode::AbortTriggered,
            format!("abort handle {} was triggered", grant.abort_handle_id),
        )),
        ConsentCheck::Denied { latest } => {
            let message = match latest {
                Some(grant) => format!(
                    "latest grant {} for {} is {:?}",
                    grant.abort_handle_id, request.operation_kind, grant.status
                ),
                None => format!("no consent grant covers {}", request.operation_kind),
            };
            GateOutcome::Failed(Reason::new(ReasonCode::NoValidConsent, message))
        }
    }
}

fn check_corridors(engine: &OrchestrationEngine, ctx: &mut EvaluationContext<'_>) -> GateOutcome {
    let corridor_enforced = ctx.template.as_ref().map_or(false, |t| t.corridor_enforced);
    if !corridor_enforced {
        return GateOutcome::NotApplicable;
    }

    let request = ctx.request;
    let Some(impacts) = request.impact.as_ref() else {
        return GateOutcome::Failed(Reason::new(
            ReasonCode::ImpactUnavailable,
            "corridor-enforced operation declared no impact data",
        ));
    };
    let Some(severity) = request.severity else {
        return GateOutcome::Failed(Reason::new(
            ReasonCode::ImpactUnavailable,
            "corridor-enforced operation declared no severity",
        ));
    };

    // Reject on identity and neurorights before holding any capacity.
    for impact in impacts {
        if impact.declared_by != request.operation_id {
            return GateOutcome::Failed(Reason::new(
                ReasonCode::ImpactUnavailable,
                format!(
                    "impact on {} declared by {}, not {}",
                    impact.corridor_id, impact.declared_by, request.operation_id
                ),
            ));
        }
        match engine
            .corridors
            .neurorights_conflicts(&impact.corridor_id, &request.channels)
        {
            Ok(conflicts) if conflicts.is_empty() => {}
            Ok(conflicts) => {
                return GateOutcome::Failed(Reason::new(
                    ReasonCode::NeurorightsViolation,
                    format!("corridor {} forbids {:?}", impact.corridor_id, conflicts),
                ))
            }
            Err(error) => return GateOutcome::Failed(corridor_error_reason(error)),
        }
    }

    let mut held: Vec<Reservation> = Vec::with_capacity(impacts.len());
    for impact in impacts {
        let admission =
            match engine
                .corridors
                .reserve(&impact.corridor_id, impact.magnitude, severity)
            {
                Ok(admission) => admission,
                Err(error) => return GateOutcome::Failed(corridor_error_reason(error)),
            };
        match admission {
            Admission::Provisional(reservation) => held.push(reservation),
            Admission::Settled(CorridorVerdict::Pass) => {}
            Admission::Settled(CorridorVerdict::AdvisoryFlag { projected, capacity }) => {
                ctx.advisories.push(Reason::new(
                    ReasonCode::CorridorAdvisory,
                    format!(
                        "corridor {} would reach {projected} of {capacity}",
                        impact.corridor_id
                    ),
                ));
            }
            Admission::Settled(CorridorVerdict::Block { projected, capacity }) => {
                return GateOutcome::Failed(Reason::new(
                    ReasonCode::CorridorOverload,
                    format!(
                        "corridor {} would reach {projected} of {capacity}",
                        impact.corridor_id
                    ),
                ));
            }
            Admission::Settled(CorridorVerdict::FpicRequired { status }) => {
                return GateOutcome::Failed(Reason::new(
                    ReasonCode::FpicNotGranted,
                    format!("corridor {} has FPIC {status}", impact.corridor_id),
                ));
            }
        }
    }

    // The abort token is re-read once everything is held; the engine commits
    // only after the decision is recorded.
    if ctx.abort_observed() {
        return GateOutcome::Aborted(Reason::new(
            ReasonCode::AbortTriggered,
            "abort signaled before corridor commit",
        ));
    }

    let detail = format!("{} impacts, {} reserved", impacts.len(), held.len());
    ctx.reservations = held;
    GateOutcome::Passed(Some(detail))
}

fn corridor_error_reason(error: CorridorError) -> Reason {
    match error {
        CorridorError::UnknownCorridor(id) => Reason::new(
            ReasonCode::UnknownCorridor,
            format!("corridor {id} is not configured"),
        ),
        other => Reason::new(ReasonCode::ImpactUnavailable, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use covenant_corridor::{CorridorGate, CorridorSpec, FpicStatus};
    use covenant_registry::{ContractRegistry, ContractTemplate};
    use covenant_types::{AgentId, CorridorId, CorridorImpact, OperationId, OperationKind, OperationRequest};

    use super::*;

    fn river() -> CorridorId {
        CorridorId::new("eco:river:upper").unwrap()
    }

    fn engine() -> OrchestrationEngine {
        let corridors = CorridorGate::new(
            [CorridorSpec::new(river(), 10.0).with_fpic(FpicStatus::Granted)],
            0.5,
        )
        .unwrap();
        let registry = ContractRegistry::with_templates([ContractTemplate::new("field_intervention")
            .with_consent()
            .with_corridor()])
        .unwrap();
        OrchestrationEngine::builder()
            .corridors(Arc::new(corridors))
            .registry(Arc::new(registry))
            .build()
            .unwrap()
    }

    fn request() -> OperationRequest {
        OperationRequest::new("op-1", "field_intervention", "human-1")
            .with_severity(0.9)
            .with_impacts(vec![CorridorImpact::new(river(), 4.0, OperationId::new("op-1"))])
    }

    fn grant(engine: &OrchestrationEngine) -> covenant_consent::ConsentGrant {
        let scope: BTreeSet<OperationKind> = [OperationKind::new("field_intervention")]
            .into_iter()
            .collect();
        engine
            .consent
            .grant(AgentId::new("human-1"), scope, Duration::seconds(60))
            .unwrap()
    }

    #[test]
    fn test_corridor_gate_holds_capacity_without_committing() {
        let engine = engine();
        grant(&engine);
        let request = request();

        let mut ctx = EvaluationContext::new(&request, Utc::now());
        assert!(matches!(resolve_template(&engine, &mut ctx), GateOutcome::Passed(_)));
        assert!(matches!(check_consent(&engine, &mut ctx), GateOutcome::Passed(_)));
        assert!(matches!(check_corridors(&engine, &mut ctx), GateOutcome::Passed(_)));

        assert_eq!(ctx.reservations.len(), 1);
        let held = engine.corridors.snapshot(&river()).unwrap();
        assert_eq!(held.reserved, 4.0);
        assert_eq!(held.consumed, 0.0);

        drop(ctx);
        let released = engine.corridors.snapshot(&river()).unwrap();
        assert_eq!(released.reserved, 0.0);
        assert_eq!(released.consumed, 0.0);
    }

    #[test]
    fn test_abort_after_consent_is_caught_before_commit() {
        let engine = engine();
        let grant = grant(&engine);
        let request = request();

        let mut ctx = EvaluationContext::new(&request, Utc::now());
        assert!(matches!(resolve_template(&engine, &mut ctx), GateOutcome::Passed(_)));
        assert!(matches!(check_consent(&engine, &mut ctx), GateOutcome::Passed(_)));

        // The token the consent gate captured flips before the corridor gate runs.
        engine.consent.abort(grant.abort_handle_id).unwrap();

        match check_corridors(&engine, &mut ctx) {
            GateOutcome::Aborted(reason) => assert_eq!(reason.code, ReasonCode::AbortTriggered),
            _ => panic!("corridor gate ignored a triggered abort handle"),
        }
        assert!(ctx.reservations.is_empty());
        let snapshot = engine.corridors.snapshot(&river()).unwrap();
        assert_eq!(snapshot.reserved, 0.0);
        assert_eq!(snapshot.consumed, 0.0);
    }

    #[test]
    fn test_missing_severity_is_refused() {
        let engine = engine();
        let mut request = request();
        request.severity = None;

        let mut ctx = EvaluationContext::new(&request, Utc::now());
        assert!(matches!(resolve_template(&engine, &mut ctx), GateOutcome::Passed(_)));
        match check_corridors(&engine, &mut ctx) {
            GateOutcome::Failed(reason) => assert_eq!(reason.code, ReasonCode::ImpactUnavailable),
            _ => panic!("missing severity was not refused"),
        }
        assert_eq!(engine.corridors.snapshot(&river()).unwrap().reserved, 0.0);
    }
}
