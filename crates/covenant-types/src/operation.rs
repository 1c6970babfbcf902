use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AgentId, CorridorImpact};

/// Caller-supplied identifier of one requested operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registered operation kind, e.g. `"stimulus_adjust"` or `"telemetry_export"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationKind(pub String);

impl OperationKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channels an operation declares it would use. Checked against corridor
/// neurorights constraints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationChannels {
    #[serde(default)]
    pub fear_or_pain_stimulus: bool,
    #[serde(default)]
    pub mental_state_inference: bool,
    #[serde(default)]
    pub belief_shaping: bool,
}

/// A request for the engine to decide on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub operation_id: OperationId,
    pub operation_kind: OperationKind,
    pub agent_id: AgentId,
    /// Requested parameter level per capability name.
    #[serde(default)]
    pub requested_capabilities_context: BTreeMap<String, f64>,
    /// `None` means the impact is unknown; `Some(vec![])` declares none.
    #[serde(default)]
    pub impact: Option<Vec<CorridorImpact>>,
    /// Left unset, a corridor-enforced operation is refused.
    #[serde(default)]
    pub severity: Option<f64>,
    #[serde(default)]
    pub channels: OperationChannels,
}

impl OperationRequest {
    pub fn new(
        operation_id: impl Into<String>,
        operation_kind: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: OperationId::new(operation_id),
            operation_kind: OperationKind::new(operation_kind),
            agent_id: AgentId::new(agent_id),
            requested_capabilities_context: BTreeMap::new(),
            impact: None,
            severity: None,
            channels: OperationChannels::default(),
        }
    }

    pub fn with_level(mut self, capability: impl Into<String>, level: f64) -> Self {
        self.requested_capabilities_context
            .insert(capability.into(), level);
        self
    }

    pub fn with_impacts(mut self, impacts: Vec<CorridorImpact>) -> Self {
        self.impact = Some(impacts);
        self
    }

    pub fn with_severity(mut self, severity: f64) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_channels(mut self, channels: OperationChannels) -> Self {
        self.channels = channels;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_severity_stays_unknown() {
        let request: OperationRequest = serde_json::from_str(
            r#"{
                "operation_id": "op-1",
                "operation_kind": "habitat_survey",
                "agent_id": "eco-1",
                "impact": [
                    {"corridor_id": "eco:river", "magnitude": 1000.0, "declared_by": "op-1"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(request.severity, None);
        assert_eq!(request.impact.map(|i| i.len()), Some(1));
        assert_eq!(request.channels, OperationChannels::default());
    }

    #[test]
    fn builder_sets_declared_severity() {
        let request = OperationRequest::new("op-1", "habitat_survey", "eco-1").with_severity(0.0);
        assert_eq!(request.severity, Some(0.0));
    }
}
