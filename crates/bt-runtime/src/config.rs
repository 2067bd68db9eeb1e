//! Scheduler configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Per-module scheduler settings, loadable from YAML.
///
/// ```yaml
/// tick_budget_ms: 250
/// debugger_attached: false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wall-clock ceiling for one `tick` drain. `None` disables the safety valve.
    pub tick_budget_ms: Option<u64>,

    /// Suppresses the safety valve so breakpoint pauses are not reported as runaway ticks.
    pub debugger_attached: bool,
}

fn default_tick_budget_ms() -> Option<u64> {
    Some(1000)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_budget_ms: default_tick_budget_ms(),
            debugger_attached: false,
        }
    }
}

impl SchedulerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn with_tick_budget(mut self, budget: Duration) -> Self {
        self.tick_budget_ms = Some(budget.as_millis() as u64);
        self
    }

    pub fn without_tick_budget(mut self) -> Self {
        self.tick_budget_ms = None;
        self
    }

    /// Effective budget, or `None` when disabled or a debugger is attached.
    pub fn tick_budget(&self) -> Option<Duration> {
        if self.debugger_attached {
            return None;
        }
        self.tick_budget_ms.map(Duration::from_millis)
    }
}
