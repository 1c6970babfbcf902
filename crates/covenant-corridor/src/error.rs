use covenant_types::CorridorId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorridorError {
    #[error("unknown corridor: {0}")]
    UnknownCorridor(CorridorId),

    #[error("corridor {0} configured more than once")]
    DuplicateCorridor(CorridorId),

    #[error("corridor {corridor}: capacity must be finite and non-negative, got {capacity}")]
    InvalidCapacity { corridor: CorridorId, capacity: f64 },

    #[error("corridor {corridor}: magnitude must be finite and non-negative, got {magnitude}")]
    InvalidMagnitude { corridor: CorridorId, magnitude: f64 },

    #[error("severity must be finite, got {0}")]
    InvalidSeverity(f64),

    #[error("high impact threshold must be finite, got {0}")]
    InvalidThreshold(f64),
}
