//! File-based configuration for the API versioning engine.
//!
//! Deserializes the YAML schema and lowers it onto
//! [`VersioningConfigBuilder`], so file and code configuration share the
//! same validation.

use crate::config::{ConfigError, VersioningConfig, VersioningConfigBuilder, DEFAULT_VERSION};
use crate::metrics::DEFAULT_METRICS_PREFIX;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level versioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersioningSettings {
    /// Version used when no strategy yields one
    #[serde(default = "default_version")]
    pub default_version: String,

    /// Closed set of accepted versions (empty accepts any)
    #[serde(default)]
    pub valid_versions: Vec<String>,

    /// Enabled detection strategies
    #[serde(default)]
    pub detection: DetectionSettings,

    /// Deprecated versions and their sunset dates
    #[serde(default)]
    pub deprecated: Vec<DeprecatedVersion>,

    /// Report versions past sunset as gone
    #[serde(default)]
    pub enforce_sunset: bool,

    /// Send `X-API-Version` on every response
    #[serde(default = "default_true")]
    pub send_version_header: bool,

    /// Send `Warning: 299` for deprecated versions
    #[serde(default = "default_true")]
    pub emit_warning: bool,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsSettings,
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl Default for VersioningSettings {
    fn default() -> Self {
        Self {
            default_version: default_version(),
            valid_versions: Vec::new(),
            detection: DetectionSettings::default(),
            deprecated: Vec::new(),
            enforce_sunset: false,
            send_version_header: true,
            emit_warning: true,
            metrics: MetricsSettings::default(),
        }
    }
}

impl VersioningSettings {
    /// Load settings from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings by building a configuration from them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_builder().build().map(|_| ())
    }

    /// Builder pre-populated from these settings. Callbacks, clock, and
    /// observer can be attached before building.
    pub fn to_builder(&self) -> VersioningConfigBuilder {
        let mut builder = VersioningConfig::builder()
            .default_version(self.default_version.as_str())
            .valid_versions(self.valid_versions.iter().cloned())
            .enforce_sunset(self.enforce_sunset)
            .send_version_header(self.send_version_header)
            .emit_warning(self.emit_warning);

        let detection = &self.detection;
        if let Some(pattern) = &detection.path {
            builder = builder.path_detection(pattern);
        }
        if let Some(name) = &detection.header {
            builder = builder.header_detection(name.as_str());
        }
        if let Some(name) = &detection.query {
            builder = builder.query_detection(name.as_str());
        }
        if let Some(pattern) = &detection.accept {
            builder = builder.accept_detection(pattern);
        }

        for deprecated in &self.deprecated {
            builder = builder.deprecate(deprecated.version.as_str(), deprecated.sunset_at);
            if let Some(link) = &deprecated.link {
                builder = builder.deprecation_link(deprecated.version.as_str(), link.as_str());
            }
        }

        builder
    }
}

/// Detection strategy parameters; an absent entry disables the strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionSettings {
    /// Path pattern, e.g. `/v{version}/`
    #[serde(default)]
    pub path: Option<String>,

    /// Header name, e.g. `X-API-Version`
    #[serde(default)]
    pub header: Option<String>,

    /// Query parameter name, e.g. `version`
    #[serde(default)]
    pub query: Option<String>,

    /// Media type pattern, e.g. `application/vnd.api.{version}+json`
    #[serde(default)]
    pub accept: Option<String>,
}

/// A deprecated version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeprecatedVersion {
    pub version: String,

    /// Date after which the version is removed (RFC 3339).
    /// Used for the Sunset header (RFC 8594)
    pub sunset_at: DateTime<Utc>,

    /// Link to migration documentation
    #[serde(default)]
    pub link: Option<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSettings {
    /// Whether to collect Prometheus metrics
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefix for metric names
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: default_metrics_prefix(),
        }
    }
}

fn default_metrics_prefix() -> String {
    DEFAULT_METRICS_PREFIX.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strategy;
    use std::io::Write;

    const FULL_YAML: &str = r#"
default_version: v2
valid_versions: [v1, v2, v3]
detection:
  path: "/v{version}/"
  header: X-API-Version
  query: version
  accept: "application/vnd.api.{version}+json"
deprecated:
  - version: v1
    sunset_at: "2025-12-31T00:00:00Z"
    link: https://docs.example.com/migrate-v1
enforce_sunset: true
emit_warning: false
"#;

    #[test]
    fn test_parse_full_settings() {
        let settings = VersioningSettings::from_yaml(FULL_YAML).unwrap();
        assert_eq!(settings.default_version, "v2");
        assert_eq!(settings.valid_versions, vec!["v1", "v2", "v3"]);
        assert_eq!(settings.deprecated.len(), 1);
        assert!(settings.enforce_sunset);
        assert!(settings.send_version_header);
        assert!(!settings.emit_warning);
        assert!(settings.metrics.enabled);

        let config = settings.to_builder().build().unwrap();
        assert_eq!(config.enabled_strategies(), &Strategy::PRIORITY[1..]);
        assert_eq!(
            config.sunset_for("v1"),
            Some("2025-12-31T00:00:00Z".parse().unwrap())
        );
        assert_eq!(
            config.deprecation_link("v1"),
            Some("https://docs.example.com/migrate-v1")
        );
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = VersioningSettings::from_yaml("{}").unwrap();
        assert_eq!(settings.default_version, "v1");
        assert!(settings.emit_warning);
        assert_eq!(settings.metrics.prefix, "zentinel_api_versioning");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(VersioningSettings::from_yaml("default_versoin: v2").is_err());
        assert!(VersioningSettings::from_yaml("detection:\n  cookie: v").is_err());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let yaml = r#"
valid_versions: [v2]
detection:
  path: /api/
deprecated:
  - version: v1
    sunset_at: "2025-12-31T00:00:00Z"
"#;
        let err = VersioningSettings::from_yaml(yaml).unwrap_err();
        let err = err.downcast_ref::<ConfigError>().unwrap();
        assert_eq!(err.errors().len(), 2);
        assert!(err.to_string().contains("path_detection"));
        assert!(err.to_string().contains("\"v1\""));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_YAML.as_bytes()).unwrap();

        let settings = VersioningSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.detection.header.as_deref(), Some("X-API-Version"));
    }

    #[test]
    fn test_missing_file() {
        assert!(VersioningSettings::from_file(Path::new("/nonexistent/versioning.yaml")).is_err());
    }
}
