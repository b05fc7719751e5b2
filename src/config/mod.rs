use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TaskError};
use crate::provider::ProviderConfig;

pub mod worker;

/// Periodic requeue of tasks stuck in PENDING/IN_PROGRESS (producer crashed
/// between record write and publish, or a worker died mid-task). Off unless
/// configured.
#[derive(Deserialize, Debug, Clone)]
pub struct SweepConfig {
    pub interval_secs: u64,
    pub stale_after_secs: u64,
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(TaskError::ConfigValidationError(
                "SweepConfig: interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.stale_after_secs == 0 {
            return Err(TaskError::ConfigValidationError(
                "SweepConfig: stale_after_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Worker configuration read from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct WorkerConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub sweep: Option<SweepConfig>,
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        self.provider.validate()?;
        if let Some(sweep) = &self.sweep {
            sweep.validate()?;
        }
        Ok(())
    }
}

/// Loads and validates the worker configuration YAML file.
pub fn load_worker_config<P: AsRef<Path>>(config_path: P) -> Result<WorkerConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        TaskError::ConfigError(format!(
            "Failed to read worker config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    let config: WorkerConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        TaskError::ConfigError(format!(
            "Failed to parse worker config YAML from '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    config.validate()?;

    Ok(config)
}
