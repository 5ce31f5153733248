//! YAML configuration for the `dvc` binary.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! sharding:
//!   shards: 16
//!   layout: long
//! logging:
//!   level: warn
//! ```
//!
//! Every section is optional; missing values fall back to their defaults.

use std::io::{BufReader, BufWriter};
use std::path::Path;

use dvc_core::{MAX_SHARDS, SHORT_SHARD_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".dvc.yml";

/// Which id layout `dvc shard new` emits by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdLayout {
    /// 64-bit `{timestamp, shard, sequence}` ids.
    #[default]
    Long,
    /// Decimal `ticks * 1000 + shard` ids.
    Short,
}

/// Defaults for shard id generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingConfig {
    /// Number of shards ids are spread over.
    pub shards: u32,
    /// Id layout to emit.
    pub layout: IdLayout,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            shards: 16,
            layout: IdLayout::Long,
        }
    }
}

impl ShardingConfig {
    /// Checks that the shard settings can be served by the id layouts.
    ///
    /// # Errors
    ///
    /// [`Invalid`](ConfigError::Invalid) when `shards` is 0, exceeds the
    /// long layout's shard space, or exceeds 1000 with the short layout.
    pub fn validate(&self) -> Result<()> {
        let shards = self.shards;
        if shards == 0 || shards > MAX_SHARDS {
            return Err(ConfigError::Invalid(format!(
                "sharding.shards must be between 1 and {MAX_SHARDS}, got {shards}"
            )));
        }
        if self.layout == IdLayout::Short && shards > SHORT_SHARD_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "sharding.shards must be at most {SHORT_SHARD_LIMIT} with the short layout, got {shards}"
            )));
        }
        Ok(())
    }
}

/// Logging settings; `RUST_LOG` and `--log-level` take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `warn` or `dvc_core=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Top-level `dvc` configuration.
///
/// # Examples
///
/// ```
/// use dvc_config::{DvcConfig, IdLayout};
///
/// let config: DvcConfig = serde_yaml::from_str("sharding: { shards: 4 }").unwrap();
/// assert_eq!(config.sharding.shards, 4);
/// assert_eq!(config.sharding.layout, IdLayout::Long);
/// assert_eq!(config.logging.level, "warn");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DvcConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    pub sharding: ShardingConfig,
    pub logging: LoggingConfig,
}

impl Default for DvcConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            sharding: ShardingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DvcConfig {
    /// Reads configuration from a YAML file without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be read,
    /// or [`YamlError`](ConfigError::YamlError) if parsing fails.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Loads and validates configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read), plus [`Invalid`](ConfigError::Invalid)
    /// if [`validate`](Self::validate) rejects it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when given, otherwise [`DEFAULT_CONFIG_FILE`] when it
    /// exists, otherwise returns the defaults. Values are not validated, so
    /// callers check only the sections they use.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read). An explicit `path` that does not exist
    /// is an error.
    pub fn read_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::read(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Like [`read_or_default`](Self::read_or_default), then validates.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config = Self::read_or_default(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be
    /// written, or [`YamlError`](ConfigError::YamlError) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// See [`ShardingConfig::validate`].
    pub fn validate(&self) -> Result<()> {
        self.sharding.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
sharding:
  shards: 32
  layout: short
logging:
  level: debug
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: DvcConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.sharding.shards, 32);
        assert_eq!(config.sharding.layout, IdLayout::Short);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_empty_document_uses_defaults() {
        let config: DvcConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, DvcConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: DvcConfig = serde_yaml::from_str("sharding:\n  layout: short\n").unwrap();
        assert_eq!(config.sharding.shards, 16);
        assert_eq!(config.sharding.layout, IdLayout::Short);
    }

    #[test]
    fn test_unknown_layout_is_rejected() {
        assert!(serde_yaml::from_str::<DvcConfig>("sharding:\n  layout: medium\n").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_shards() {
        let mut config = DvcConfig::default();
        config.sharding.shards = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_too_many_shards() {
        let mut config = DvcConfig::default();
        config.sharding.shards = MAX_SHARDS + 1;
        assert!(config.validate().is_err());
        config.sharding.shards = MAX_SHARDS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_short_layout_limit() {
        let mut config = DvcConfig::default();
        config.sharding.layout = IdLayout::Short;
        config.sharding.shards = 1001;
        assert!(config.validate().is_err());
        config.sharding.shards = 1000;
        assert!(config.validate().is_ok());
    }
}
