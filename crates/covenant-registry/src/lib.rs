//! Covenant Registry - contract templates
//!
//! A template states which checks an operation kind must pass. Templates
//! are data; the engine owns the fixed set of checks they switch on.
//! Lookups of unregistered kinds fail, and callers treat that as a denial.

#![deny(unsafe_code)]

use covenant_types::OperationKind;
use serde::{Deserialize, Serialize};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Checks an operation kind must satisfy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTemplate {
    pub operation_kind: OperationKind,
    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,
    #[serde(default)]
    pub requires_consent: bool,
    #[serde(default)]
    pub corridor_enforced: bool,
}

impl ContractTemplate {
    pub fn new(operation_kind: impl Into<String>) -> Self {
        Self {
            operation_kind: OperationKind::new(operation_kind),
            required_capabilities: BTreeSet::new(),
            requires_consent: false,
            corridor_enforced: false,
        }
    }

    pub fn requiring(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.insert(capability.into());
        self
    }

    pub fn with_consent(mut self) -> Self {
        self.requires_consent = true;
        self
    }

    pub fn with_corridor(mut self) -> Self {
        self.corridor_enforced = true;
        self
    }
}

/// Registry of contract templates keyed by operation kind.
pub struct ContractRegistry {
    inner: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    templates: HashMap<OperationKind, Arc<ContractTemplate>>,
    /// Set when a duplicate registration was attempted.
    halted_by: Option<OperationKind>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryState::default()),
        }
    }

    /// Build a registry from a batch of templates, failing on the first
    /// duplicate.
    pub fn with_templates(
        templates: impl IntoIterator<Item = ContractTemplate>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for template in templates {
            registry.register(template)?;
        }
        Ok(registry)
    }

    /// Register a template. A duplicate kind is a structural violation: it
    /// is refused and further registrations halt until [`resume`](Self::resume).
    pub fn register(&self, template: ContractTemplate) -> Result<(), RegistryError> {
        let mut state = self.inner.write();

        if let Some(kind) = &state.halted_by {
            warn!(blocked = %template.operation_kind, halted_by = %kind, "registry halted");
            return Err(RegistryError::Halted(kind.clone()));
        }

        if state.templates.contains_key(&template.operation_kind) {
            error!(
                operation_kind = %template.operation_kind,
                "duplicate contract template; registry writes halted"
            );
            state.halted_by = Some(template.operation_kind.clone());
            return Err(RegistryError::DuplicateTemplate(template.operation_kind));
        }

        info!(
            operation_kind = %template.operation_kind,
            requires_consent = template.requires_consent,
            corridor_enforced = template.corridor_enforced,
            "contract template registered"
        );
        state
            .templates
            .insert(template.operation_kind.clone(), Arc::new(template));
        Ok(())
    }

    pub fn lookup(&self, kind: &OperationKind) -> Result<Arc<ContractTemplate>, RegistryError> {
        let state = self.inner.read();
        state
            .templates
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownOperation(kind.clone()))
    }

    /// Operator acknowledgement of a duplicate; re-opens registration.
    pub fn resume(&self) -> Option<OperationKind> {
        let mut state = self.inner.write();
        let cleared = state.halted_by.take();
        if let Some(kind) = &cleared {
            info!(operation_kind = %kind, "registry writes resumed");
        }
        cleared
    }

    pub fn is_halted(&self) -> bool {
        self.inner.read().halted_by.is_some()
    }

    pub fn kinds(&self) -> Vec<OperationKind> {
        let mut kinds: Vec<_> = self.inner.read().templates.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.inner.read().templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ContractRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown operation kind: {0}")]
    UnknownOperation(OperationKind),

    #[error("template already registered for {0}")]
    DuplicateTemplate(OperationKind),

    #[error("registry halted after duplicate template for {0}")]
    Halted(OperationKind),
}
