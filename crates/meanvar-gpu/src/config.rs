//! Engine configuration with TOML, environment variable and default sources.

use std::path::Path;
use std::{env, fs};

use serde::{Deserialize, Serialize};

/// Errors produced by configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`EngineConfig`].
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Config could not be written as TOML.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A field holds an unusable value.
    #[error("validation error: {0}")]
    Validation(String),

    /// An environment override could not be parsed.
    #[error("invalid environment variable value for {key}: {value}")]
    InvalidEnvVar {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
    },
}

/// Settings for an [`AggregateEngine`](crate::AggregateEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on the number of reduction passes a plan may contain.
    pub max_passes: usize,
    /// Work-group size for the mean kernel (at least 2); queried from the
    /// device when unset.
    pub mean_work_group_size: Option<usize>,
    /// Work-group size for the variance kernel (at least 2); queried from the
    /// device when unset.
    pub variance_work_group_size: Option<usize>,
    /// Relative tolerance used when comparing against host references.
    pub tolerance: f32,
    /// `tracing` filter directive.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_passes: 64,
            mean_work_group_size: None,
            variance_work_group_size: None,
            tolerance: 1e-4,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build a config from `MEANVAR_*` environment variables on top of the
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `MEANVAR_*` environment variables on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = env::var("MEANVAR_MAX_PASSES") {
            self.max_passes = parse_env_usize("MEANVAR_MAX_PASSES", &v)?;
        }
        if let Ok(v) = env::var("MEANVAR_MEAN_WORKGROUP_SIZE") {
            self.mean_work_group_size =
                Some(parse_env_usize("MEANVAR_MEAN_WORKGROUP_SIZE", &v)?);
        }
        if let Ok(v) = env::var("MEANVAR_VAR_WORKGROUP_SIZE") {
            self.variance_work_group_size =
                Some(parse_env_usize("MEANVAR_VAR_WORKGROUP_SIZE", &v)?);
        }
        if let Ok(v) = env::var("MEANVAR_TOLERANCE") {
            self.tolerance = v.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
                key: "MEANVAR_TOLERANCE".to_string(),
                value: v.clone(),
            })?;
        }
        if let Ok(v) = env::var("MEANVAR_LOG_LEVEL") {
            self.log_level = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_passes == 0 {
            return Err(ConfigError::Validation("max_passes must be at least 1".into()));
        }
        for (name, size) in [
            ("mean_work_group_size", self.mean_work_group_size),
            ("variance_work_group_size", self.variance_work_group_size),
        ] {
            if matches!(size, Some(0 | 1)) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be at least 2, got {}",
                    size.unwrap_or_default()
                )));
            }
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::Validation(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Validation("log_level must not be empty".into()));
        }
        Ok(())
    }

    /// Overlay `other` on `self`. Options set in `other` win; scalar fields
    /// are taken from `other` when they differ from the default.
    pub fn merge_with(&self, other: &Self) -> Self {
        let defaults = Self::default();
        Self {
            max_passes: if other.max_passes != defaults.max_passes {
                other.max_passes
            } else {
                self.max_passes
            },
            mean_work_group_size: other.mean_work_group_size.or(self.mean_work_group_size),
            variance_work_group_size: other
                .variance_work_group_size
                .or(self.variance_work_group_size),
            tolerance: if other.tolerance != defaults.tolerance {
                other.tolerance
            } else {
                self.tolerance
            },
            log_level: if other.log_level != defaults.log_level {
                other.log_level.clone()
            } else {
                self.log_level.clone()
            },
        }
    }
}

fn parse_env_usize(key: &str, val: &str) -> Result<usize, ConfigError> {
    val.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
        key: key.to_string(),
        value: val.to_string(),
    })
}
