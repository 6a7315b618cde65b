use serde::{Deserialize, Serialize};

use crate::error::{FormulaError, Result};

pub const DEFAULT_CAPACITY: usize = 1024;

/// Engine settings. Loadable from JSON; missing keys take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bars retained; older bars are dropped as new ones arrive.
    pub capacity: usize,
    /// Keep dynamic series cached until the bar data actually changes.
    pub memoize_dynamic: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            memoize_dynamic: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: EngineConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        tracing::debug!(capacity = cfg.capacity, memoize = cfg.memoize_dynamic, "engine config loaded");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(FormulaError::precondition("capacity must be > 0"));
        }
        Ok(())
    }
}
