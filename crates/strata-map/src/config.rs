use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use strata_common::{Result, StrataError};

/// Tuning for [`crate::ChunkManager`].
///
/// ```json
/// { "workers": 4, "memory_threshold": 0.25, "region_extension": "mca" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Reload threads; `None` uses the number of CPUs, at least two.
    pub workers: Option<usize>,
    /// Free-memory ratio at or below which loaded chunks are evicted.
    pub memory_threshold: f64,
    /// Extension of region files picked up by a folder scan.
    pub region_extension: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            workers: None,
            memory_threshold: 0.2,
            region_extension: "mca".to_owned(),
        }
    }
}

impl ManagerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ManagerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| {
            StrataError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.memory_threshold) {
            return Err(StrataError::Config(format!(
                "memory_threshold {} is outside 0..=1",
                self.memory_threshold
            )));
        }
        if self.workers == Some(0) {
            return Err(StrataError::Config("workers must be at least 1".to_owned()));
        }
        if self.region_extension.is_empty() {
            return Err(StrataError::Config("region_extension is empty".to_owned()));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get().max(2))
    }
}
