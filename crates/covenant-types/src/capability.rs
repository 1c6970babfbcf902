//! Capabilities and the superset relation that guards rights history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named right with an optional upper bound on its parameter.
///
/// `bound: None` means the capability is unbounded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound: Option<f64>,
}

impl Capability {
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bound: None,
        }
    }

    pub fn bounded(name: impl Into<String>, bound: f64) -> Self {
        Self {
            name: name.into(),
            bound: Some(bound),
        }
    }

    /// Whether this capability grants at least as much as `other`.
    ///
    /// Names must match. An unbounded capability covers anything; a bounded
    /// one covers only a bound that is no larger.
    pub fn covers(&self, other: &Capability) -> bool {
        if self.name != other.name {
            return false;
        }
        match (self.bound, other.bound) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => mine >= theirs,
        }
    }

    /// Whether `level` is allowed under this capability's bound.
    pub fn permits_level(&self, level: f64) -> bool {
        match self.bound {
            None => level.is_finite(),
            Some(bound) => level.is_finite() && level <= bound,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty()
            && self.bound.map_or(true, |b| b.is_finite() && b >= 0.0)
    }
}

/// A set of capabilities keyed by name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    entries: BTreeMap<String, Option<f64>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a capability by name.
    pub fn insert(&mut self, capability: Capability) {
        self.entries.insert(capability.name, capability.bound);
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn get(&self, name: &str) -> Option<Capability> {
        self.entries.get(name).map(|bound| Capability {
            name: name.to_string(),
            bound: *bound,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.entries.iter().map(|(name, bound)| Capability {
            name: name.clone(),
            bound: *bound,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `self ⊇ previous`: every capability of `previous` is present here
    /// with a bound that did not shrink.
    pub fn is_superset_of(&self, previous: &CapabilitySet) -> bool {
        self.missing_from(previous).is_empty()
    }

    /// Capabilities of `previous` that this set no longer covers.
    pub fn missing_from(&self, previous: &CapabilitySet) -> Vec<Capability> {
        previous
            .iter()
            .filter(|old| match self.get(&old.name) {
                Some(new) => !new.covers(old),
                None => true,
            })
            .collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::new();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}
