use covenant_types::{AgentId, Capability};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SovereigntyError {
    #[error("rollback attempt for agent {agent_id} at version {current_version}: {} capabilities would be lost", lost.len())]
    RollbackAttempt {
        agent_id: AgentId,
        current_version: u64,
        lost: Vec<Capability>,
    },

    #[error("agent not enrolled: {0}")]
    UnknownAgent(AgentId),

    #[error("agent already enrolled: {0}")]
    AlreadyEnrolled(AgentId),

    #[error("malformed capability: {0}")]
    InvalidCapability(String),
}

impl SovereigntyError {
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, SovereigntyError::RollbackAttempt { .. })
    }
}
