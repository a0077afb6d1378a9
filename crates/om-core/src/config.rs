//! Configuration structures for the mapper.
//!
//! - [`EngineConfig`] - Execution settings (tracker sizing, plan logging)
//! - [`MapperConfig`] - Root configuration: global option defaults plus engine
//!   settings
//!
//! All types implement [`Default`] and deserialize with missing fields
//! falling back to those defaults.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::options::GlobalOptions;

/// Settings of the execution engine.
///
/// # Examples
///
/// ```
/// use om_core::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.tracker_capacity, 64);
/// assert!(!config.log_plans);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial capacity of the per-call reference tracker.
    pub tracker_capacity: usize,

    /// Whether each newly compiled plan is logged at `debug` level.
    pub log_plans: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracker_capacity: 64,
            log_plans: false,
        }
    }
}

/// Root configuration of a mapper.
///
/// # Examples
///
/// ```
/// use om_core::{CollectionBehavior, MapperConfig};
///
/// let config = MapperConfig::from_json_str(r#"{"defaults": {"collection_behavior": "merge"}}"#).unwrap();
/// assert_eq!(config.defaults.collection_behavior, CollectionBehavior::Merge);
/// assert_eq!(config.engine.tracker_capacity, 64);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Global option defaults.
    pub defaults: GlobalOptions,

    /// Engine settings.
    pub engine: EngineConfig,
}

impl MapperConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks option values that deserialize but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tracker_capacity == 0 {
            return Err(ConfigError::InvalidOption {
                option: "engine.tracker_capacity".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ReferenceBehavior;

    #[test]
    fn test_mapper_config_defaults() {
        let config = MapperConfig::default();
        assert_eq!(config.defaults, GlobalOptions::default());
        assert_eq!(config.engine.tracker_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"defaults": {"reference_behavior": "use_target_instance_if_not_null"}}"#;
        let config = MapperConfig::from_json_str(json).unwrap();
        assert_eq!(
            config.defaults.reference_behavior,
            ReferenceBehavior::UseTargetInstanceIfNotNull
        );
        assert!(!config.engine.log_plans);
    }

    #[test]
    fn test_zero_tracker_capacity_rejected() {
        let err = MapperConfig::from_json_str(r#"{"engine": {"tracker_capacity": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { .. }));
    }

    #[test]
    fn test_unknown_behavior_is_parse_error() {
        let err = MapperConfig::from_json_str(r#"{"defaults": {"collection_behavior": "zip"}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = MapperConfig::from_path(Utf8Path::new("/nonexistent/objmap.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_config_serialization() {
        let config = MapperConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: MapperConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
