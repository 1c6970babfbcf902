use covenant_types::{AgentId, OperationKind};
use thiserror::Error;

use crate::AbortHandleId;

#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("agent {agent_id} already holds active grant {existing} covering {overlap:?}")]
    OverlappingGrant {
        agent_id: AgentId,
        existing: AbortHandleId,
        overlap: Vec<OperationKind>,
    },

    #[error("consent scope must name at least one operation kind")]
    EmptyScope,

    #[error("invalid ttl: {0}")]
    InvalidTtl(String),

    #[error("unknown abort handle: {0}")]
    UnknownHandle(AbortHandleId),
}
