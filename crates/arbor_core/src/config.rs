//! Engine-wide tunables

use crate::instance::MAX_INSTANCES;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of collections created without an explicit one.
    pub collection_max_instances: u32,
    /// Delete-queue drains per `post_update`; leftovers wait for the next call.
    pub max_delete_passes: u32,
    /// Rounds of socket draining per dispatch while handlers keep posting.
    pub max_dispatch_iterations: u32,
    /// Default for new instances: whether parent Z scale stretches child translation.
    pub scale_along_z: bool,
    /// Level size from which transform propagation runs on the rayon pool.
    pub parallel_level_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collection_max_instances: 1024,
            max_delete_passes: 10,
            max_dispatch_iterations: 10,
            scale_along_z: false,
            parallel_level_threshold: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("collection capacity {requested} exceeds the maximum of {max}")]
    CapacityTooLarge { requested: u32, max: u32 },

    #[error("max_delete_passes must be at least 1")]
    NoDeletePasses,

    #[error("max_dispatch_iterations must be at least 1")]
    NoDispatchIterations,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection_max_instances > MAX_INSTANCES {
            return Err(ConfigError::CapacityTooLarge {
                requested: self.collection_max_instances,
                max: MAX_INSTANCES,
            });
        }
        if self.max_delete_passes == 0 {
            return Err(ConfigError::NoDeletePasses);
        }
        if self.max_dispatch_iterations == 0 {
            return Err(ConfigError::NoDispatchIterations);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "max_delete_passes": 3 }"#).unwrap();
        assert_eq!(config.max_delete_passes, 3);
        assert_eq!(config.collection_max_instances, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let config = EngineConfig {
            collection_max_instances: MAX_INSTANCES + 1,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CapacityTooLarge { .. })
        ));

        let config = EngineConfig {
            max_delete_passes: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoDeletePasses));
    }
}
