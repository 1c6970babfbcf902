use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbortHandleId(pub uuid::Uuid);

impl AbortHandleId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for AbortHandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared abort token bound to one consent grant.
///
/// Triggering is one-way: once set, the token stays triggered and is never
/// reused for another grant.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    id: AbortHandleId,
    triggered: Arc<AtomicBool>,
}

impl AbortHandle {
    pub(crate) fn new(id: AbortHandleId) -> Self {
        Self {
            id,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> AbortHandleId {
        self.id
    }

    /// Signal abort. Returns `true` if this call flipped the token.
    pub fn trigger(&self) -> bool {
        !self.triggered.swap(true, Ordering::SeqCst)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_one_way_and_shared() {
        let handle = AbortHandle::new(AbortHandleId::generate());
        let holder = handle.clone();
        assert!(!handle.is_triggered());

        assert!(holder.trigger());
        assert!(handle.is_triggered());
        assert!(!handle.trigger());
        assert!(holder.is_triggered());
    }
}
