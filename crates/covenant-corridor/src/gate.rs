use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use covenant_types::{CorridorId, CorridorKind, OperationChannels};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{CorridorError, FpicStatus, NeurorightsFlag};

/// Static description of a corridor, as loaded from configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorridorSpec {
    pub id: CorridorId,
    #[serde(default)]
    pub kind: CorridorKind,
    pub capacity: f64,
    #[serde(default)]
    pub fpic: FpicStatus,
    #[serde(default)]
    pub neurorights: BTreeSet<NeurorightsFlag>,
}

impl CorridorSpec {
    pub fn new(id: CorridorId, capacity: f64) -> Self {
        Self {
            id,
            kind: CorridorKind::default(),
            capacity,
            fpic: FpicStatus::default(),
            neurorights: BTreeSet::new(),
        }
    }

    pub fn with_fpic(mut self, fpic: FpicStatus) -> Self {
        self.fpic = fpic;
        self
    }

    pub fn with_kind(mut self, kind: CorridorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_neuroright(mut self, flag: NeurorightsFlag) -> Self {
        self.neurorights.insert(flag);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorridorVerdict {
    Pass,
    /// Soft threshold crossed by a low-severity impact. Never blocks.
    AdvisoryFlag { projected: f64, capacity: f64 },
    Block { projected: f64, capacity: f64 },
    /// High-severity impact on a corridor without granted FPIC.
    FpicRequired { status: FpicStatus },
}

impl CorridorVerdict {
    pub fn is_block(&self) -> bool {
        matches!(self, CorridorVerdict::Block { .. })
    }

    pub fn is_advisory(&self) -> bool {
        matches!(self, CorridorVerdict::AdvisoryFlag { .. })
    }

    /// Whether the impact must not go ahead.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            CorridorVerdict::Block { .. } | CorridorVerdict::FpicRequired { .. }
        )
    }
}

/// Point-in-time view of a corridor's counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorridorSnapshot {
    pub id: CorridorId,
    pub kind: CorridorKind,
    pub fpic: FpicStatus,
    pub capacity: f64,
    pub consumed: f64,
    pub reserved: f64,
    pub advisories: u64,
}

struct CorridorState {
    spec: CorridorSpec,
    consumed: f64,
    reserved: f64,
    advisories: u64,
}

impl CorridorState {
    fn committed_and_pending(&self) -> f64 {
        self.consumed + self.reserved
    }
}

/// What the gate decided for one impact before any commit.
#[derive(Debug)]
pub enum Admission {
    /// Capacity is held for the impact until the reservation is committed
    /// or dropped.
    Provisional(Reservation),
    /// Final without a commit step: low-severity outcomes and blocks.
    Settled(CorridorVerdict),
}

/// Capacity held provisionally for one high-severity impact.
///
/// Dropping an uncommitted reservation releases it.
#[derive(Debug)]
pub struct Reservation {
    corridor: CorridorId,
    state: Arc<Mutex<CorridorState>>,
    magnitude: f64,
    settled: bool,
}

impl Reservation {
    pub fn corridor(&self) -> &CorridorId {
        &self.corridor
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    /// Move the held amount into `consumed`.
    pub fn commit(mut self) -> CorridorVerdict {
        let mut state = self.state.lock();
        state.reserved = (state.reserved - self.magnitude).max(0.0);
        state.consumed += self.magnitude;
        self.settled = true;
        debug!(
            corridor = %self.corridor,
            magnitude = self.magnitude,
            consumed = state.consumed,
            capacity = state.spec.capacity,
            "corridor impact committed"
        );
        CorridorVerdict::Pass
    }

    /// Give the held amount back without consuming it.
    pub fn release(mut self) {
        self.release_held();
    }

    fn release_held(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.state.lock();
        state.reserved = (state.reserved - self.magnitude).max(0.0);
        self.settled = true;
        debug!(corridor = %self.corridor, magnitude = self.magnitude, "corridor reservation released");
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.release_held();
    }
}

impl std::fmt::Debug for CorridorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorridorState")
            .field("id", &self.spec.id)
            .field("consumed", &self.consumed)
            .field("reserved", &self.reserved)
            .finish()
    }
}

/// Capacity gate over a fixed set of corridors.
///
/// Each corridor's counters sit behind their own lock; impacts on different
/// corridors never contend.
pub struct CorridorGate {
    corridors: HashMap<CorridorId, Arc<Mutex<CorridorState>>>,
    high_impact_threshold: f64,
}

impl CorridorGate {
    pub fn new(
        specs: impl IntoIterator<Item = CorridorSpec>,
        high_impact_threshold: f64,
    ) -> Result<Self, CorridorError> {
        if !high_impact_threshold.is_finite() {
            return Err(CorridorError::InvalidThreshold(high_impact_threshold));
        }

        let mut corridors = HashMap::new();
        for spec in specs {
            if !spec.capacity.is_finite() || spec.capacity < 0.0 {
                return Err(CorridorError::InvalidCapacity {
                    corridor: spec.id,
                    capacity: spec.capacity,
                });
            }
            let id = spec.id.clone();
            if corridors.contains_key(&id) {
                return Err(CorridorError::DuplicateCorridor(id));
            }
            corridors.insert(
                id,
                Arc::new(Mutex::new(CorridorState {
                    spec,
                    consumed: 0.0,
                    reserved: 0.0,
                    advisories: 0,
                })),
            );
        }

        Ok(Self {
            corridors,
            high_impact_threshold,
        })
    }

    pub fn high_impact_threshold(&self) -> f64 {
        self.high_impact_threshold
    }

    pub fn is_high_impact(&self, severity: f64) -> bool {
        severity >= self.high_impact_threshold
    }

    /// Decide on one impact and commit it immediately if admitted.
    pub fn evaluate(
        &self,
        corridor_id: &CorridorId,
        magnitude: f64,
        severity: f64,
    ) -> Result<CorridorVerdict, CorridorError> {
        match self.reserve(corridor_id, magnitude, severity)? {
            Admission::Provisional(reservation) => Ok(reservation.commit()),
            Admission::Settled(verdict) => Ok(verdict),
        }
    }

    /// Decide on one impact, holding capacity for high-severity impacts
    /// that fit so the caller can re-check other state before committing.
    pub fn reserve(
        &self,
        corridor_id: &CorridorId,
        magnitude: f64,
        severity: f64,
    ) -> Result<Admission, CorridorError> {
        if !severity.is_finite() {
            return Err(CorridorError::InvalidSeverity(severity));
        }
        if !magnitude.is_finite() || magnitude < 0.0 {
            return Err(CorridorError::InvalidMagnitude {
                corridor: corridor_id.clone(),
                magnitude,
            });
        }
        let handle = self.state(corridor_id)?;
        let mut state = handle.lock();
        let capacity = state.spec.capacity;

        if !self.is_high_impact(severity) {
            let projected = state.consumed + magnitude;
            if projected > capacity {
                state.advisories += 1;
                info!(
                    corridor = %corridor_id,
                    projected,
                    capacity,
                    severity,
                    "corridor advisory: low-severity impact over capacity"
                );
                return Ok(Admission::Settled(CorridorVerdict::AdvisoryFlag {
                    projected,
                    capacity,
                }));
            }
            return Ok(Admission::Settled(CorridorVerdict::Pass));
        }

        let fpic = state.spec.fpic;
        if !fpic.is_granted() {
            warn!(
                corridor = %corridor_id,
                fpic = %fpic,
                severity,
                "high-severity impact refused without granted FPIC"
            );
            return Ok(Admission::Settled(CorridorVerdict::FpicRequired { status: fpic }));
        }

        let projected = state.committed_and_pending() + magnitude;
        if projected > capacity {
            warn!(
                corridor = %corridor_id,
                projected,
                capacity,
                consumed = state.consumed,
                reserved = state.reserved,
                "corridor impact blocked"
            );
            return Ok(Admission::Settled(CorridorVerdict::Block {
                projected,
                capacity,
            }));
        }

        state.reserved += magnitude;
        drop(state);
        Ok(Admission::Provisional(Reservation {
            corridor: corridor_id.clone(),
            state: handle,
            magnitude,
            settled: false,
        }))
    }

    /// Neurorights protections of `corridor_id` that `channels` would breach.
    pub fn neurorights_conflicts(
        &self,
        corridor_id: &CorridorId,
        channels: &OperationChannels,
    ) -> Result<Vec<NeurorightsFlag>, CorridorError> {
        let handle = self.state(corridor_id)?;
        let state = handle.lock();
        Ok(state
            .spec
            .neurorights
            .iter()
            .copied()
            .filter(|flag| flag.forbids(channels))
            .collect())
    }

    pub fn snapshot(&self, corridor_id: &CorridorId) -> Result<CorridorSnapshot, CorridorError> {
        let handle = self.state(corridor_id)?;
        let state = handle.lock();
        Ok(CorridorSnapshot {
            id: state.spec.id.clone(),
            kind: state.spec.kind.clone(),
            fpic: state.spec.fpic,
            capacity: state.spec.capacity,
            consumed: state.consumed,
            reserved: state.reserved,
            advisories: state.advisories,
        })
    }

    pub fn contains(&self, corridor_id: &CorridorId) -> bool {
        self.corridors.contains_key(corridor_id)
    }

    pub fn corridor_ids(&self) -> impl Iterator<Item = &CorridorId> {
        self.corridors.keys()
    }

    fn state(&self, corridor_id: &CorridorId) -> Result<Arc<Mutex<CorridorState>>, CorridorError> {
        self.corridors
            .get(corridor_id)
            .cloned()
            .ok_or_else(|| CorridorError::UnknownCorridor(corridor_id.clone()))
    }
}
