use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use covenant_types::{AgentId, OperationKind};
use serde::{Deserialize, Serialize};

use crate::AbortHandleId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Active,
    Revoked,
    Expired,
    /// The grant's abort handle was signaled.
    Triggered,
}

impl GrantStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GrantStatus::Active)
    }
}

/// Snapshot of a consent grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentGrant {
    pub agent_id: AgentId,
    pub scope: BTreeSet<OperationKind>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub abort_handle_id: AbortHandleId,
    pub status: GrantStatus,
}

impl ConsentGrant {
    pub fn covers(&self, kind: &OperationKind) -> bool {
        self.scope.contains(kind)
    }

    pub fn overlap_with<'a>(
        &'a self,
        scope: &'a BTreeSet<OperationKind>,
    ) -> impl Iterator<Item = &'a OperationKind> {
        self.scope.intersection(scope)
    }

    /// Whether `at` falls inside `[issued_at, expires_at)`.
    pub fn window_contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.issued_at && at < self.expires_at
    }
}
