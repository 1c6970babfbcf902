use serde::{Deserialize, Serialize};

use crate::OperationId;

/// Non-empty, trimmed corridor identifier such as `"eco:river:upper-basin"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorridorId(String);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("corridor id must be non-empty")]
pub struct InvalidCorridorId;

impl CorridorId {
    pub fn new(id: impl AsRef<str>) -> Result<Self, InvalidCorridorId> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InvalidCorridorId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CorridorId {
    type Error = InvalidCorridorId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CorridorId::new(value)
    }
}

impl From<CorridorId> for String {
    fn from(id: CorridorId) -> Self {
        id.0
    }
}

impl std::fmt::Display for CorridorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive corridor type. Carries no enforcement meaning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorridorKind {
    Forest,
    Wetland,
    Desert,
    River,
    Coast,
    Mountain,
    UrbanBuffer,
    Custom(String),
    #[default]
    Unspecified,
}

/// An abstracted ecological impact declared by an operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorridorImpact {
    pub corridor_id: CorridorId,
    pub magnitude: f64,
    pub declared_by: OperationId,
}

impl CorridorImpact {
    pub fn new(corridor_id: CorridorId, magnitude: f64, declared_by: OperationId) -> Self {
        Self {
            corridor_id,
            magnitude,
            declared_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corridor_id_is_trimmed() {
        let id = CorridorId::new("  eco:river:upper  ").unwrap();
        assert_eq!(id.as_str(), "eco:river:upper");
    }

    #[test]
    fn blank_corridor_id_is_rejected() {
        assert_eq!(CorridorId::new("   "), Err(InvalidCorridorId));
        assert!(serde_json::from_str::<CorridorId>("\"\"").is_err());
    }

    #[test]
    fn corridor_id_deserializes_through_validation() {
        let id: CorridorId = serde_json::from_str("\" eco:desert \"").unwrap();
        assert_eq!(id.as_str(), "eco:desert");
    }
}
