use covenant_audit::AuditError;
use covenant_corridor::CorridorError;
use covenant_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The decision could not be recorded, so it is not returned.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("corridor setup error: {0}")]
    Corridor(#[from] CorridorError),

    #[error("registry setup error: {0}")]
    Registry(#[from] RegistryError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("telemetry error: {0}")]
    Telemetry(String),
}
