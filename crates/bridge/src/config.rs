//! Runtime configuration loading

use crate::LoggingConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use session::SessionConfig;
use std::path::Path;

/// Environment variable prefix, e.g. `EDGE_INFER__SESSION__RUN_TIMEOUT_MS`
pub const ENV_PREFIX: &str = "EDGE_INFER";

/// Combined session and logging configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Layer defaults, an optional file (TOML, JSON, ...) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
