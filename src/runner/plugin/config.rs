//! Engine configuration file parsing.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Watchdog budgets and evaluator limits.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub audio_thread_budget_ms: u64,
    pub message_thread_budget_ms: u64,
    pub compile_budget_ms: u64,
    pub max_call_depth: usize,
    /// Upper bound for array lengths and buffer sizes a script can request.
    pub max_array_length: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            audio_thread_budget_ms: 5,
            message_thread_budget_ms: 500,
            compile_budget_ms: 5000,
            max_call_depth: 256,
            max_array_length: 1 << 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeapSettings {
    /// 0 means unlimited.
    pub max_tracked_allocations: usize,
    pub collect_cycles_on_recompile: bool,
}

impl Default for HeapSettings {
    fn default() -> Self {
        HeapSettings {
            max_tracked_allocations: 0,
            collect_cycles_on_recompile: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BroadcasterConfig {
    pub pool_threads: usize,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        BroadcasterConfig { pool_threads: 1 }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub execution: ExecutionConfig,
    pub heap: HeapSettings,
    pub broadcaster: BroadcasterConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// Expected format:
    /// ```toml
    /// [execution]
    /// audio_thread_budget_ms = 5
    /// message_thread_budget_ms = 500
    ///
    /// [heap]
    /// max_tracked_allocations = 100000
    /// collect_cycles_on_recompile = true
    ///
    /// [broadcaster]
    /// pool_threads = 1
    /// ```
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: EngineConfig = toml::from_str(content)?;
        // Async delivery has to stay FIFO, which only a single worker guarantees.
        config.broadcaster.pool_threads = 1;
        Ok(config)
    }

    pub fn audio_budget(&self) -> Duration {
        Duration::from_millis(self.execution.audio_thread_budget_ms)
    }

    pub fn message_budget(&self) -> Duration {
        Duration::from_millis(self.execution.message_thread_budget_ms)
    }

    pub fn compile_budget(&self) -> Duration {
        Duration::from_millis(self.execution.compile_budget_ms)
    }

    pub fn max_array_length(&self) -> usize {
        self.execution.max_array_length
    }

    pub fn max_tracked_allocations(&self) -> Option<usize> {
        match self.heap.max_tracked_allocations {
            0 => None,
            n => Some(n),
        }
    }
}
