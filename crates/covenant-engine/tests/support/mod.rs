#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use covenant_audit::AuditLog;
use covenant_corridor::{CorridorGate, CorridorSpec, FpicStatus, NeurorightsFlag};
use covenant_engine::{EngineBuilder, OrchestrationEngine};
use covenant_registry::{ContractRegistry, ContractTemplate};
use covenant_types::{
    AgentId, AgentKind, Capability, CapabilitySet, CorridorId, CorridorImpact, CorridorKind,
    ManualClock, OperationId, OperationKind, OperationRequest,
};

pub const RIVER: &str = "eco:river:upper-basin";
pub const SANCTUARY: &str = "territory:nation-x:sanctuary";
/// Community has withheld FPIC.
pub const HOLDOUT: &str = "territory:nation-y:holdout";
pub const HIGH: f64 = 0.9;
pub const LOW: f64 = 0.1;

pub fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000)
}

pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub engine: OrchestrationEngine,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_capacity(60.0)
    }

    pub fn with_capacity(river_capacity: f64) -> Self {
        Self::build(river_capacity, Arc::new(AuditLog::new()))
    }

    pub fn with_audit(audit: Arc<AuditLog>) -> Self {
        Self::build(60.0, audit)
    }

    fn build(river_capacity: f64, audit: Arc<AuditLog>) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let corridors = CorridorGate::new(
            [
                CorridorSpec::new(corridor(RIVER), river_capacity)
                    .with_kind(CorridorKind::River)
                    .with_fpic(FpicStatus::Granted),
                CorridorSpec::new(corridor(SANCTUARY), 1_000.0)
                    .with_kind(CorridorKind::Forest)
                    .with_fpic(FpicStatus::Granted)
                    .with_neuroright(NeurorightsFlag::ForbidFearPainCoercion)
                    .with_neuroright(NeurorightsFlag::NoCovertInference),
                CorridorSpec::new(corridor(HOLDOUT), 1_000.0)
                    .with_kind(CorridorKind::Wetland)
                    .with_fpic(FpicStatus::Withheld),
            ],
            0.5,
        )
        .unwrap();
        let registry = ContractRegistry::with_templates([
            ContractTemplate::new("telemetry_read").requiring("read"),
            ContractTemplate::new("stimulus_adjust")
                .requiring("stimulus")
                .with_consent(),
            ContractTemplate::new("habitat_survey")
                .requiring("survey")
                .with_corridor(),
            ContractTemplate::new("field_intervention")
                .requiring("intervene")
                .with_consent()
                .with_corridor(),
        ])
        .unwrap();

        let engine = EngineBuilder::default()
            .clock(clock.clone())
            .corridors(Arc::new(corridors))
            .registry(Arc::new(registry))
            .audit(audit)
            .build()
            .unwrap();

        Self { clock, engine }
    }

    pub fn enroll(&self, id: &str, kind: AgentKind, capabilities: &[&str]) -> AgentId {
        let agent_id = AgentId::new(id);
        let set: CapabilitySet = capabilities
            .iter()
            .map(|name| Capability::unbounded(*name))
            .collect();
        self.engine
            .ledger()
            .enroll(agent_id.clone(), kind, set)
            .unwrap();
        agent_id
    }

    pub fn grant(&self, agent: &AgentId, kinds: &[&str], ttl_secs: i64) -> covenant_consent::ConsentGrant {
        let scope: BTreeSet<OperationKind> = kinds.iter().map(|k| OperationKind::new(*k)).collect();
        self.engine
            .consent()
            .grant(agent.clone(), scope, Duration::seconds(ttl_secs))
            .unwrap()
    }

    pub fn at(&self, secs: i64) {
        self.clock.set(t0() + Duration::seconds(secs));
    }
}

pub fn corridor(id: &str) -> CorridorId {
    CorridorId::new(id).unwrap()
}

pub fn request(op: &str, kind: &str, agent: &AgentId) -> OperationRequest {
    OperationRequest::new(op, kind, agent.as_str())
}

pub fn impact(op: &str, corridor_id: &str, magnitude: f64) -> CorridorImpact {
    CorridorImpact::new(corridor(corridor_id), magnitude, OperationId::new(op))
}
