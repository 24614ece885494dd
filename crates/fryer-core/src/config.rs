//! Configuration
//!
//! - `ResourceConfig`: per-resource settings read by steps when they run
//! - `ConfigPatch`: partial update applied by `ImageResource::config`
//! - `FryerConfig`: process configuration from TOML plus environment

use crate::error::{ConfigError, ResourceError};
use fryer_pipeline::PipelineOptions;
use fryer_storage::{Locality, RemoteConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable for the default quality
pub const QUALITY_VAR: &str = "FRYER_QUALITY";
/// Environment variable for the default locality
pub const LOCALITY_VAR: &str = "FRYER_LOCALITY";
/// Environment variable for the per-step timeout in seconds
pub const STEP_TIMEOUT_VAR: &str = "FRYER_STEP_TIMEOUT_SECS";

/// Quality used when nothing else is configured
pub const DEFAULT_QUALITY: u8 = 40;

fn check_quality(quality: u8) -> Result<u8, ResourceError> {
    if (1..=100).contains(&quality) {
        Ok(quality)
    } else {
        Err(ResourceError::InvalidQuality(quality))
    }
}

/// Per-resource settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Where load/save steps read and write
    pub locality: Locality,
    /// Base quality for degrade passes
    pub quality: u8,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            locality: Locality::Local,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl ResourceConfig {
    /// Merge the keys present in `patch`
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuality` without changing anything if the patch
    /// carries a quality outside 1..=100.
    pub fn apply(&mut self, patch: &ConfigPatch) -> Result<(), ResourceError> {
        let quality = patch.quality.map(check_quality).transpose()?;
        if let Some(locality) = patch.locality {
            self.locality = locality;
        }
        if let Some(quality) = quality {
            self.quality = quality;
        }
        Ok(())
    }
}

/// Partial update of a `ResourceConfig`
///
/// Unrecognized keys are ignored when deserializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    /// New locality
    pub locality: Option<Locality>,
    /// New default quality
    #[serde(alias = "qualityDefault", alias = "quality_default")]
    pub quality: Option<u8>,
}

impl ConfigPatch {
    /// Create empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With locality
    #[inline]
    #[must_use]
    pub fn with_locality(mut self, locality: Locality) -> Self {
        self.locality = Some(locality);
        self
    }

    /// With default quality
    #[inline]
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Build from a loose JSON object
    ///
    /// `null` is an empty patch.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a non-object value or a recognized
    /// key of the wrong type.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ResourceError> {
        match value {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| ResourceError::InvalidConfig(e.to_string())),
            other => Err(ResourceError::InvalidConfig(format!(
                "expected an object, got {other}"
            ))),
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Deadline per step in seconds, none by default
    pub step_timeout_secs: Option<u64>,
    /// Buffered pipeline events per subscriber
    pub event_capacity: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            step_timeout_secs: None,
            event_capacity: 64,
        }
    }
}

/// Local storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory relative keys resolve against
    pub root: Option<PathBuf>,
}

/// Process configuration
///
/// ```toml
/// [resource]
/// locality = "remote"
/// quality = 35
///
/// [remote]
/// bucket = "photos"
/// endpoint = "http://127.0.0.1:9000"
///
/// [pipeline]
/// step_timeout_secs = 30
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FryerConfig {
    /// Defaults for new resources
    pub resource: ResourceConfig,
    /// Remote object store
    pub remote: RemoteConfig,
    /// Pipeline options
    pub pipeline: PipelineSection,
    /// Local storage
    pub storage: StorageSection,
}

impl FryerConfig {
    /// Load from an optional TOML file, then apply the process environment
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), "loaded config file");
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse TOML without consulting the environment
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or an out-of-range quality.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Override from a variable lookup
    ///
    /// # Errors
    ///
    /// Returns `Env` for a value that does not parse.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(QUALITY_VAR) {
            let quality = raw
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(|q| check_quality(q).ok())
                .ok_or_else(|| ConfigError::Env {
                    var: QUALITY_VAR,
                    reason: format!("'{raw}' is not a quality in 1..=100"),
                })?;
            self.resource.quality = quality;
        }
        if let Some(raw) = get(LOCALITY_VAR) {
            self.resource.locality = raw.parse().map_err(|_| ConfigError::Env {
                var: LOCALITY_VAR,
                reason: format!("'{raw}' is neither 'local' nor 'remote'"),
            })?;
        }
        if let Some(raw) = get(STEP_TIMEOUT_VAR) {
            let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::Env {
                var: STEP_TIMEOUT_VAR,
                reason: e.to_string(),
            })?;
            self.pipeline.step_timeout_secs = Some(secs);
        }

        self.remote.apply_env_with(&lookup);
        Ok(())
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `Invalid` naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_quality(self.resource.quality)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.pipeline.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Options for pipelines built from this configuration
    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        let options = PipelineOptions::new().with_event_capacity(self.pipeline.event_capacity);
        match self.pipeline.step_timeout_secs {
            Some(secs) if secs > 0 => options.with_step_timeout(Duration::from_secs(secs)),
            _ => options,
        }
    }
}
