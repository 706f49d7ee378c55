//! Engine configuration loaded from rivulet.yml

use crate::error::{CoreError, CoreResult};
use crate::serde_helpers::default_true;
use crate::trigger::TriggerSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Plan optimizer settings
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Trigger state storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Streaming execution defaults
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Run the rewrite rules at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Upper bound on rule passes before giving up on a fixpoint
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    100
}

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process optimistic store (default)
    #[default]
    Memory,
    /// DuckDB file or in-memory database
    DuckDb,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::DuckDb => write!(f, "duckdb"),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend kind
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database path for file-backed stores (or `:memory:`)
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    ":memory:".to_string()
}

/// Streaming defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingConfig {
    /// Triggers used by a GROUP BY that names none
    #[serde(default = "default_triggers")]
    pub default_triggers: Vec<TriggerSpec>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            default_triggers: default_triggers(),
        }
    }
}

fn default_triggers() -> Vec<TriggerSpec> {
    vec![TriggerSpec::EndOfStream]
}

impl EngineConfig {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a directory
    /// Looks for rivulet.yml or rivulet.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("rivulet.yml");
        let yaml_path = dir.join("rivulet.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.optimizer.max_iterations == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "optimizer.max_iterations must be at least 1".to_string(),
            });
        }

        if self.storage.backend == StorageBackend::DuckDb && self.storage.path.trim().is_empty()
        {
            return Err(CoreError::ConfigInvalid {
                message: "storage.path cannot be empty for the duckdb backend".to_string(),
            });
        }

        for spec in &self.streaming.default_triggers {
            match spec {
                TriggerSpec::Counting { count: 0 } => {
                    return Err(CoreError::ConfigInvalid {
                        message: "counting trigger needs a count of at least 1".to_string(),
                    });
                }
                TriggerSpec::Delay { delay_ms: 0 } => {
                    return Err(CoreError::ConfigInvalid {
                        message: "delay trigger needs a positive delay_ms".to_string(),
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
