//! Static engine configuration

use covenant_corridor::CorridorSpec;
use covenant_registry::ContractTemplate;
use serde::{Deserialize, Serialize};

/// Everything the engine needs at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Severity at or above which corridor impacts are enforced
    #[serde(default = "default_high_impact_threshold")]
    pub high_impact_threshold: f64,

    /// Corridor capacities
    #[serde(default)]
    pub corridors: Vec<CorridorSpec>,

    /// Contract templates registered at startup
    #[serde(default)]
    pub templates: Vec<ContractTemplate>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            high_impact_threshold: default_high_impact_threshold(),
            corridors: Vec::new(),
            templates: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_high_impact_threshold() -> f64 {
    0.5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Layer defaults, an optional file, then `COVENANT_*` environment
    /// variables (nested keys use `__`, e.g. `COVENANT_LOGGING__LEVEL`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("COVENANT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
