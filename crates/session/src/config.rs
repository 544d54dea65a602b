//! Session configuration

use model_loader::Accelerator;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for one inference in milliseconds; `None` waits indefinitely
    pub run_timeout_ms: Option<u64>,

    /// Accelerator requested for loaded models
    pub accelerator: Accelerator,

    /// Directory relative model paths resolve against
    pub asset_root: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            run_timeout_ms: None,
            accelerator: Accelerator::Cpu,
            asset_root: None,
        }
    }
}

impl SessionConfig {
    /// Create realtime config (bounded inference time)
    pub fn realtime() -> Self {
        Self {
            run_timeout_ms: Some(500),
            ..Default::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.run_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }
}
