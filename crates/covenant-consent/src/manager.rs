use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use covenant_types::{AgentId, Clock, OperationKind, SystemClock};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{AbortHandle, AbortHandleId, ConsentError, ConsentGrant, GrantStatus};

struct GrantEntry {
    grant: ConsentGrant,
    handle: AbortHandle,
}

impl GrantEntry {
    /// Fold observed facts into the stored status. Terminal states stick.
    fn observe(&mut self, at: DateTime<Utc>) {
        if self.grant.status != GrantStatus::Active {
            return;
        }
        if self.handle.is_triggered() {
            self.grant.status = GrantStatus::Triggered;
            debug!(handle = %self.grant.abort_handle_id, "grant observed as triggered");
        } else if at >= self.grant.expires_at {
            self.grant.status = GrantStatus::Expired;
            debug!(
                handle = %self.grant.abort_handle_id,
                expires_at = %self.grant.expires_at,
                "grant expired"
            );
        }
    }
}

/// Result of checking consent for one operation.
#[derive(Clone, Debug)]
pub enum ConsentCheck {
    /// A live grant covers the operation. `handle` is its abort token.
    Authorized {
        grant: ConsentGrant,
        handle: AbortHandle,
    },
    /// The covering grant's abort handle was triggered inside its window.
    Triggered { grant: ConsentGrant },
    /// No usable grant. `latest` is the most recent covering grant, if any.
    Denied { latest: Option<ConsentGrant> },
}

impl ConsentCheck {
    pub fn is_authorized(&self) -> bool {
        matches!(self, ConsentCheck::Authorized { .. })
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self, ConsentCheck::Triggered { .. })
    }
}

/// Owns every consent grant and its abort handle.
pub struct ConsentManager {
    agents: DashMap<AgentId, Arc<Mutex<Vec<GrantEntry>>>>,
    handles: DashMap<AbortHandleId, AgentId>,
    clock: Arc<dyn Clock>,
}

impl ConsentManager {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            agents: DashMap::new(),
            handles: DashMap::new(),
            clock,
        }
    }

    /// Issue a grant for `scope`, valid for `ttl` from now.
    pub fn grant(
        &self,
        agent_id: AgentId,
        scope: BTreeSet<OperationKind>,
        ttl: Duration,
    ) -> Result<ConsentGrant, ConsentError> {
        if scope.is_empty() {
            return Err(ConsentError::EmptyScope);
        }
        if ttl <= Duration::zero() {
            return Err(ConsentError::InvalidTtl(format!("{ttl} is not positive")));
        }

        let issued_at = self.clock.now();
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| ConsentError::InvalidTtl(format!("{ttl} overflows the calendar")))?;

        let entries = self.entries_for(&agent_id);
        let mut entries = entries.lock();

        for entry in entries.iter_mut() {
            entry.observe(issued_at);
            if entry.grant.status != GrantStatus::Active {
                continue;
            }
            let overlap: Vec<OperationKind> = entry.grant.overlap_with(&scope).cloned().collect();
            if !overlap.is_empty() {
                warn!(
                    agent = %agent_id,
                    existing = %entry.grant.abort_handle_id,
                    "overlapping consent grant refused"
                );
                return Err(ConsentError::OverlappingGrant {
                    agent_id,
                    existing: entry.grant.abort_handle_id,
                    overlap,
                });
            }
        }

        let handle_id = AbortHandleId::generate();
        let grant = ConsentGrant {
            agent_id: agent_id.clone(),
            scope,
            issued_at,
            expires_at,
            abort_handle_id: handle_id,
            status: GrantStatus::Active,
        };
        entries.push(GrantEntry {
            grant: grant.clone(),
            handle: AbortHandle::new(handle_id),
        });
        self.handles.insert(handle_id, agent_id.clone());

        info!(
            agent = %agent_id,
            handle = %handle_id,
            expires_at = %expires_at,
            "consent granted"
        );
        Ok(grant)
    }

    /// Withdraw a grant for future use. Idempotent; terminal grants are
    /// returned unchanged.
    pub fn revoke(&self, handle_id: AbortHandleId) -> Result<ConsentGrant, ConsentError> {
        let now = self.clock.now();
        self.with_entry(handle_id, |entry| {
            entry.observe(now);
            if entry.grant.status == GrantStatus::Active {
                entry.grant.status = GrantStatus::Revoked;
                info!(handle = %handle_id, agent = %entry.grant.agent_id, "consent revoked");
            }
            entry.grant.clone()
        })
    }

    /// Trigger the grant's abort handle. Any in-flight consumer holding the
    /// token sees it at its next checkpoint.
    ///
    /// Only an `Active` grant becomes `Triggered`; a revoked or expired grant
    /// keeps its status.
    pub fn abort(&self, handle_id: AbortHandleId) -> Result<ConsentGrant, ConsentError> {
        let now = self.clock.now();
        self.with_entry(handle_id, |entry| {
            entry.observe(now);
            let flipped = entry.handle.trigger();
            if entry.grant.status == GrantStatus::Active {
                entry.grant.status = GrantStatus::Triggered;
            }
            if flipped {
                warn!(
                    handle = %handle_id,
                    agent = %entry.grant.agent_id,
                    "abort handle triggered"
                );
            }
            entry.grant.clone()
        })
    }

    pub fn is_authorized(
        &self,
        agent_id: &AgentId,
        kind: &OperationKind,
        at: DateTime<Utc>,
    ) -> bool {
        self.check(agent_id, kind, at).is_authorized()
    }

    /// Find the grant relevant to `kind` for `agent_id` at `at`.
    ///
    /// A live grant wins. Otherwise a triggered grant whose window is still
    /// open is reported as `Triggered`, so callers can halt rather than
    /// merely deny.
    pub fn check(&self, agent_id: &AgentId, kind: &OperationKind, at: DateTime<Utc>) -> ConsentCheck {
        let entries = match self.agents.get(agent_id).map(|e| Arc::clone(e.value())) {
            Some(entries) => entries,
            None => return ConsentCheck::Denied { latest: None },
        };
        let mut entries = entries.lock();

        let mut triggered: Option<&GrantEntry> = None;
        let mut latest: Option<&GrantEntry> = None;

        for entry in entries.iter_mut() {
            entry.observe(at);
        }

        for entry in entries.iter().filter(|e| e.grant.covers(kind)) {
            match entry.grant.status {
                GrantStatus::Active if entry.grant.window_contains(at) => {
                    return ConsentCheck::Authorized {
                        grant: entry.grant.clone(),
                        handle: entry.handle.clone(),
                    };
                }
                GrantStatus::Triggered if entry.grant.window_contains(at) => {
                    if triggered.map_or(true, |t| t.grant.issued_at <= entry.grant.issued_at) {
                        triggered = Some(entry);
                    }
                }
                _ => {}
            }
            if latest.map_or(true, |l| l.grant.issued_at <= entry.grant.issued_at) {
                latest = Some(entry);
            }
        }

        match triggered {
            Some(entry) => ConsentCheck::Triggered {
                grant: entry.grant.clone(),
            },
            None => ConsentCheck::Denied {
                latest: latest.map(|e| e.grant.clone()),
            },
        }
    }

    /// Clone of the abort token for its holder.
    pub fn handle(&self, handle_id: AbortHandleId) -> Option<AbortHandle> {
        self.with_entry(handle_id, |entry| entry.handle.clone()).ok()
    }

    pub fn grant_status(&self, handle_id: AbortHandleId) -> Result<ConsentGrant, ConsentError> {
        let now = self.clock.now();
        self.with_entry(handle_id, |entry| {
            entry.observe(now);
            entry.grant.clone()
        })
    }

    /// All grants ever issued to `agent_id`, oldest first.
    pub fn grants(&self, agent_id: &AgentId) -> Vec<ConsentGrant> {
        let now = self.clock.now();
        match self.agents.get(agent_id).map(|e| Arc::clone(e.value())) {
            Some(entries) => {
                let mut entries = entries.lock();
                let grants = entries
                    .iter_mut()
                    .map(|entry| {
                        entry.observe(now);
                        entry.grant.clone()
                    })
                    .collect();
                grants
            }
            None => Vec::new(),
        }
    }

    fn entries_for(&self, agent_id: &AgentId) -> Arc<Mutex<Vec<GrantEntry>>> {
        Arc::clone(
            self.agents
                .entry(agent_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
                .value(),
        )
    }

    fn with_entry<T>(
        &self,
        handle_id: AbortHandleId,
        f: impl FnOnce(&mut GrantEntry) -> T,
    ) -> Result<T, ConsentError> {
        let agent_id = self
            .handles
            .get(&handle_id)
            .map(|e| e.value().clone())
            .ok_or(ConsentError::UnknownHandle(handle_id))?;
        let entries = self
            .agents
            .get(&agent_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(ConsentError::UnknownHandle(handle_id))?;
        let mut entries = entries.lock();
        let entry = entries
            .iter_mut()
            .find(|e| e.grant.abort_handle_id == handle_id)
            .ok_or(ConsentError::UnknownHandle(handle_id))?;
        Ok(f(entry))
    }
}

impl Default for ConsentManager {
    fn default() -> Self {
        Self::new()
    }
}
