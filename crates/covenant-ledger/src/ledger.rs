use std::sync::Arc;

use chrono::{DateTime, Utc};
use covenant_types::{Agent, AgentId, AgentKind, CapabilitySet, Clock, SystemClock};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::SovereigntyError;

/// One immutable version of an agent's rights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SovereigntyBaseline {
    pub agent_id: AgentId,
    pub version: u64,
    pub capabilities: CapabilitySet,
    pub created_at: DateTime<Utc>,
}

struct AgentHistory {
    kind: AgentKind,
    /// Never empty once enrolled; index `i` holds version `i + 1`.
    baselines: Vec<Arc<SovereigntyBaseline>>,
}

impl AgentHistory {
    fn latest(&self) -> Option<&Arc<SovereigntyBaseline>> {
        self.baselines.last()
    }
}

/// Append-only store of capability baselines, one history per agent.
pub struct SovereigntyLedger {
    agents: DashMap<AgentId, Arc<RwLock<AgentHistory>>>,
    clock: Arc<dyn Clock>,
}

impl SovereigntyLedger {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            agents: DashMap::new(),
            clock,
        }
    }

    /// Record an agent and its first baseline (version 1).
    pub fn enroll(
        &self,
        agent_id: AgentId,
        kind: AgentKind,
        capabilities: CapabilitySet,
    ) -> Result<Agent, SovereigntyError> {
        validate(&capabilities)?;

        match self.agents.entry(agent_id.clone()) {
            Entry::Occupied(_) => Err(SovereigntyError::AlreadyEnrolled(agent_id)),
            Entry::Vacant(slot) => {
                let baseline = Arc::new(SovereigntyBaseline {
                    agent_id: agent_id.clone(),
                    version: 1,
                    capabilities,
                    created_at: self.clock.now(),
                });
                slot.insert(Arc::new(RwLock::new(AgentHistory {
                    kind,
                    baselines: vec![baseline],
                })));
                info!(agent = %agent_id, kind = %kind, "agent enrolled at baseline v1");
                Ok(Agent {
                    agent_id,
                    kind,
                    baseline_version: 1,
                })
            }
        }
    }

    /// Append a new baseline if it keeps every current capability.
    ///
    /// Returns the new version number. A proposal that would lose or narrow
    /// any capability is rejected as a rollback and nothing is recorded.
    pub fn propose(
        &self,
        agent_id: &AgentId,
        new_capabilities: CapabilitySet,
    ) -> Result<u64, SovereigntyError> {
        validate(&new_capabilities)?;
        let history = self.history_handle(agent_id)?;
        let mut history = history.write();

        let current = history
            .latest()
            .cloned()
            .ok_or_else(|| SovereigntyError::UnknownAgent(agent_id.clone()))?;

        let lost = new_capabilities.missing_from(&current.capabilities);
        if !lost.is_empty() {
            error!(
                agent = %agent_id,
                current_version = current.version,
                lost = ?lost.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "rejected baseline rollback attempt"
            );
            return Err(SovereigntyError::RollbackAttempt {
                agent_id: agent_id.clone(),
                current_version: current.version,
                lost,
            });
        }

        let version = current.version + 1;
        history.baselines.push(Arc::new(SovereigntyBaseline {
            agent_id: agent_id.clone(),
            version,
            capabilities: new_capabilities,
            created_at: self.clock.now(),
        }));
        info!(agent = %agent_id, version, "baseline advanced");
        Ok(version)
    }

    /// The latest baseline for `agent_id`.
    pub fn current(&self, agent_id: &AgentId) -> Result<Arc<SovereigntyBaseline>, SovereigntyError> {
        let history = self.history_handle(agent_id)?;
        let history = history.read();
        debug!(agent = %agent_id, "baseline read");
        history
            .latest()
            .cloned()
            .ok_or_else(|| SovereigntyError::UnknownAgent(agent_id.clone()))
    }

    pub fn baseline(
        &self,
        agent_id: &AgentId,
        version: u64,
    ) -> Result<Option<Arc<SovereigntyBaseline>>, SovereigntyError> {
        let history = self.history_handle(agent_id)?;
        let history = history.read();
        let index = match version.checked_sub(1) {
            Some(index) => index as usize,
            None => return Ok(None),
        };
        Ok(history.baselines.get(index).cloned())
    }

    /// Every baseline ever recorded for the agent, oldest first.
    pub fn history(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<Arc<SovereigntyBaseline>>, SovereigntyError> {
        let history = self.history_handle(agent_id)?;
        let history = history.read();
        Ok(history.baselines.clone())
    }

    pub fn agent(&self, agent_id: &AgentId) -> Option<Agent> {
        let history = self.agents.get(agent_id).map(|entry| Arc::clone(entry.value()))?;
        let history = history.read();
        Some(Agent {
            agent_id: agent_id.clone(),
            kind: history.kind,
            baseline_version: history.latest().map_or(0, |b| b.version),
        })
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    // The map guard is released before the per-agent lock is taken.
    fn history_handle(
        &self,
        agent_id: &AgentId,
    ) -> Result<Arc<RwLock<AgentHistory>>, SovereigntyError> {
        self.agents
            .get(agent_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SovereigntyError::UnknownAgent(agent_id.clone()))
    }
}

impl Default for SovereigntyLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(capabilities: &CapabilitySet) -> Result<(), SovereigntyError> {
    match capabilities.iter().find(|c| !c.is_well_formed()) {
        Some(bad) => Err(SovereigntyError::InvalidCapability(format!(
            "{} (bound {:?})",
            bad.name, bad.bound
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_types::Capability;
    use proptest::prelude::*;

    fn caps(names: &[&str]) -> CapabilitySet {
        names.iter().map(|n| Capability::unbounded(*n)).collect()
    }

    fn enrolled(ledger: &SovereigntyLedger, id: &str, names: &[&str]) -> AgentId {
        let agent_id = AgentId::new(id);
        ledger
            .enroll(agent_id.clone(), AgentKind::Human, caps(names))
            .unwrap();
        agent_id
    }

    #[test]
    fn test_rollback_is_rejected_and_current_unchanged() {
        let ledger = SovereigntyLedger::new();
        let agent = enrolled(&ledger, "agent-1", &["read"]);

        assert_eq!(ledger.propose(&agent, caps(&["read", "write"])).unwrap(), 2);

        let err = ledger.propose(&agent, caps(&["read"])).unwrap_err();
        assert!(matches!(
            err,
            SovereigntyError::RollbackAttempt { current_version: 2, ref lost, .. }
                if lost.len() == 1 && lost[0].name == "write"
        ));
        assert!(err.is_integrity_violation());

        let current = ledger.current(&agent).unwrap();
        assert_eq!(current.version, 2);
        assert!(current.capabilities.contains("write"));
        assert_eq!(ledger.history(&agent).unwrap().len(), 2);
    }

    #[test]
    fn test_equal_set_is_accepted_as_new_version() {
        let ledger = SovereigntyLedger::new();
        let agent = enrolled(&ledger, "agent-1", &["read"]);
        assert_eq!(ledger.propose(&agent, caps(&["read"])).unwrap(), 2);
    }

    #[test]
    fn test_narrowing_a_bound_is_a_rollback() {
        let ledger = SovereigntyLedger::new();
        let agent = AgentId::new("neuro-1");
        ledger
            .enroll(
                agent.clone(),
                AgentKind::Neuromorphic,
                CapabilitySet::new().with(Capability::bounded("stimulus", 4.0)),
            )
            .unwrap();

        let narrowed = CapabilitySet::new().with(Capability::bounded("stimulus", 3.0));
        assert!(ledger.propose(&agent, narrowed).is_err());

        let widened = CapabilitySet::new().with(Capability::unbounded("stimulus"));
        assert_eq!(ledger.propose(&agent, widened).unwrap(), 2);

        let capped_again = CapabilitySet::new().with(Capability::bounded("stimulus", 100.0));
        assert!(ledger.propose(&agent, capped_again).is_err());
    }

    #[test]
    fn test_unknown_and_duplicate_agents() {
        let ledger = SovereigntyLedger::new();
        let ghost = AgentId::new("ghost");
        assert!(matches!(
            ledger.current(&ghost),
            Err(SovereigntyError::UnknownAgent(_))
        ));
        assert!(ledger.propose(&ghost, caps(&["read"])).is_err());

        let agent = enrolled(&ledger, "agent-1", &[]);
        assert!(matches!(
            ledger.enroll(agent, AgentKind::Ecological, caps(&["x"])),
            Err(SovereigntyError::AlreadyEnrolled(_))
        ));
    }

    #[test]
    fn test_malformed_capability_rejected() {
        let ledger = SovereigntyLedger::new();
        let result = ledger.enroll(
            AgentId::new("a"),
            AgentKind::Augmented,
            CapabilitySet::new().with(Capability::bounded("x", f64::INFINITY)),
        );
        assert!(matches!(result, Err(SovereigntyError::InvalidCapability(_))));
        assert_eq!(ledger.agent_count(), 0);
    }

    #[test]
    fn test_baseline_lookup_by_version() {
        let ledger = SovereigntyLedger::new();
        let agent = enrolled(&ledger, "agent-1", &["read"]);
        ledger.propose(&agent, caps(&["read", "write"])).unwrap();

        let v1 = ledger.baseline(&agent, 1).unwrap().unwrap();
        assert!(!v1.capabilities.contains("write"));
        assert!(ledger.baseline(&agent, 0).unwrap().is_none());
        assert!(ledger.baseline(&agent, 3).unwrap().is_none());

        let record = ledger.agent(&agent).unwrap();
        assert_eq!(record.baseline_version, 2);
        assert_eq!(record.kind, AgentKind::Human);
    }

    #[test]
    fn test_concurrent_proposals_for_one_agent_are_serialized() {
        let ledger = SovereigntyLedger::new();
        let agent = enrolled(&ledger, "agent-1", &["base"]);

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let ledger = &ledger;
                let agent = &agent;
                scope.spawn(move || {
                    for step in 0..10 {
                        // Each proposal keeps whatever is current and adds one name.
                        loop {
                            let mut next = ledger.current(agent).unwrap().capabilities.clone();
                            next.insert(Capability::unbounded(format!("w{worker}-{step}")));
                            if ledger.propose(agent, next).is_ok() {
                                break;
                            }
                        }
                    }
                });
            }
        });

        let history = ledger.history(&agent).unwrap();
        for pair in history.windows(2) {
            assert_eq!(pair[1].version, pair[0].version + 1);
            assert!(pair[1].capabilities.is_superset_of(&pair[0].capabilities));
        }
    }

    proptest! {
        #[test]
        fn property_history_is_monotonic(
            proposals in prop::collection::vec(
                prop::collection::btree_set("[a-f]", 0..6),
                1..16,
            )
        ) {
            let ledger = SovereigntyLedger::new();
            let agent = AgentId::new("prop-agent");
            ledger.enroll(agent.clone(), AgentKind::Human, CapabilitySet::new()).unwrap();

            for names in proposals {
                let set: CapabilitySet = names.into_iter().map(Capability::unbounded).collect();
                let before = ledger.current(&agent).unwrap();
                match ledger.propose(&agent, set.clone()) {
                    Ok(version) => {
                        prop_assert!(set.is_superset_of(&before.capabilities));
                        prop_assert_eq!(version, before.version + 1);
                    }
                    Err(_) => {
                        prop_assert!(!set.is_superset_of(&before.capabilities));
                        prop_assert_eq!(ledger.current(&agent).unwrap().version, before.version);
                    }
                }
            }

            let history = ledger.history(&agent).unwrap();
            for pair in history.windows(2) {
                prop_assert!(pair[1].capabilities.is_superset_of(&pair[0].capabilities));
            }
        }
    }
}
