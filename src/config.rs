//! Configuration for the API versioning engine.
//!
//! A [`VersioningConfig`] is assembled once through
//! [`VersioningConfigBuilder`], validated as a whole, and then frozen. Every
//! builder option checks its own argument; failures are collected rather
//! than returned eagerly so a single [`ConfigError::Invalid`] can name every
//! problem at once.

use crate::extract::{PatternError, VersionPattern};
use crate::observer::VersionObserver;
use crate::request::RequestView;
use chrono::{DateTime, Utc};
use http::HeaderName;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Version assumed when nothing else is configured.
pub const DEFAULT_VERSION: &str = "v1";

/// Injectable source of "now".
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Caller-supplied detector consulted before every built-in strategy.
pub type CustomDetector = Arc<dyn Fn(&dyn RequestView) -> Option<String> + Send + Sync>;

/// Invoked with `(version, route)` whenever a deprecated version is served.
pub type DeprecatedUseCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// A method of extracting a candidate version from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Custom,
    Path,
    Header,
    Accept,
    Query,
}

impl Strategy {
    /// Detection order, highest priority first.
    pub const PRIORITY: [Strategy; 5] = [
        Strategy::Custom,
        Strategy::Path,
        Strategy::Header,
        Strategy::Accept,
        Strategy::Query,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Custom => "custom",
            Strategy::Path => "path",
            Strategy::Header => "header",
            Strategy::Accept => "accept",
            Strategy::Query => "query",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building a [`VersioningConfig`].
///
/// Each message names the builder option that fixes it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("header detection needs a non-empty header name; call header_detection(\"X-API-Version\")")]
    EmptyHeaderName,

    #[error("header detection name {name:?} is not a valid HTTP header name; call header_detection(\"X-API-Version\")")]
    InvalidHeaderName { name: String },

    #[error("query detection needs a non-empty parameter name; call query_detection(\"version\")")]
    EmptyQueryParam,

    #[error("{option} pattern {pattern:?} is missing the {{version}} placeholder; call {option}(\"/v{{version}}/\")")]
    MissingPlaceholder {
        option: &'static str,
        pattern: String,
    },

    #[error("{option} pattern {pattern:?} starts with the {{version}} placeholder; call {option}() with a literal prefix before it")]
    PlaceholderAtStart {
        option: &'static str,
        pattern: String,
    },

    #[error("default version cannot be empty; call default_version(\"v1\")")]
    EmptyDefaultVersion,

    #[error("valid versions cannot contain an empty entry; remove it from valid_versions()")]
    EmptyValidVersion,

    #[error("deprecated version cannot be empty; call deprecate(\"v1\", sunset) with a version name")]
    EmptyDeprecatedVersion,

    #[error("deprecation link for {version:?} cannot be empty; call deprecation_link({version:?}, url) with a URL")]
    EmptyDeprecationLink { version: String },

    #[error("deprecation link version cannot be empty; call deprecation_link(\"v1\", url) with a version name")]
    EmptyLinkVersion,

    #[error("deprecated version {version:?} is not a valid version; add it via valid_versions() or remove the deprecate({version:?}, ..) call")]
    DeprecatedNotValid { version: String },

    #[error("invalid versioning configuration:\n{}", format_errors(.0))]
    Invalid(Vec<ConfigError>),
}

impl ConfigError {
    /// The individual failures, flattening [`ConfigError::Invalid`].
    pub fn errors(&self) -> Vec<&ConfigError> {
        match self {
            ConfigError::Invalid(errors) => errors.iter().flat_map(ConfigError::errors).collect(),
            other => vec![other],
        }
    }

    fn from_pattern(option: &'static str, pattern: &str, error: PatternError) -> Self {
        let pattern = pattern.to_string();
        match error {
            PatternError::MissingPlaceholder => ConfigError::MissingPlaceholder { option, pattern },
            PatternError::PlaceholderAtStart => ConfigError::PlaceholderAtStart { option, pattern },
        }
    }
}

fn format_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("  {}. {}", i + 1, e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Which built-in strategies are enabled, with their parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionStrategies {
    pub path: Option<VersionPattern>,
    pub header: Option<String>,
    pub query: Option<String>,
    pub accept: Option<VersionPattern>,
}

/// Frozen versioning configuration.
#[derive(Clone)]
pub struct VersioningConfig {
    detection: DetectionStrategies,
    custom_detector: Option<CustomDetector>,
    default_version: String,
    valid_versions: Vec<String>,
    deprecated_versions: HashMap<String, DateTime<Utc>>,
    deprecation_links: HashMap<String, String>,
    enforce_sunset: bool,
    send_version_header: bool,
    emit_warning: bool,
    deprecated_use_callback: Option<DeprecatedUseCallback>,
    clock: Clock,
    observer: Option<Arc<dyn VersionObserver>>,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            detection: DetectionStrategies::default(),
            custom_detector: None,
            default_version: DEFAULT_VERSION.to_string(),
            valid_versions: Vec::new(),
            deprecated_versions: HashMap::new(),
            deprecation_links: HashMap::new(),
            enforce_sunset: false,
            send_version_header: true,
            emit_warning: true,
            deprecated_use_callback: None,
            clock: Arc::new(Utc::now),
            observer: None,
        }
    }
}

impl VersioningConfig {
    pub fn builder() -> VersioningConfigBuilder {
        VersioningConfigBuilder::default()
    }

    /// Re-check the global invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.default_version.is_empty() {
            errors.push(ConfigError::EmptyDefaultVersion);
        }
        if let Some(name) = self.detection.header.as_deref() {
            if name.is_empty() {
                errors.push(ConfigError::EmptyHeaderName);
            } else if HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(ConfigError::InvalidHeaderName {
                    name: name.to_string(),
                });
            }
        }
        if self.detection.query.as_deref() == Some("") {
            errors.push(ConfigError::EmptyQueryParam);
        }
        for (option, pattern) in [
            ("path_detection", &self.detection.path),
            ("accept_detection", &self.detection.accept),
        ] {
            if let Some(pattern) = pattern {
                if let Err(e) = VersionPattern::parse(pattern.as_str()) {
                    errors.push(ConfigError::from_pattern(option, pattern.as_str(), e));
                }
            }
        }
        if self.valid_versions.iter().any(String::is_empty) {
            errors.push(ConfigError::EmptyValidVersion);
        }

        if !self.valid_versions.is_empty() {
            let mut missing: Vec<&String> = self
                .deprecated_versions
                .keys()
                .filter(|v| !self.valid_versions.contains(v))
                .collect();
            missing.sort();
            errors.extend(missing.into_iter().map(|version| ConfigError::DeprecatedNotValid {
                version: version.clone(),
            }));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn detection(&self) -> &DetectionStrategies {
        &self.detection
    }

    pub fn custom_detector(&self) -> Option<&CustomDetector> {
        self.custom_detector.as_ref()
    }

    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    /// Whitelist in configured order; empty means any version is accepted.
    pub fn valid_versions(&self) -> &[String] {
        &self.valid_versions
    }

    pub fn deprecated_versions(&self) -> &HashMap<String, DateTime<Utc>> {
        &self.deprecated_versions
    }

    /// Sunset timestamp of a deprecated version.
    pub fn sunset_for(&self, version: &str) -> Option<DateTime<Utc>> {
        self.deprecated_versions.get(version).copied()
    }

    pub fn deprecation_link(&self, version: &str) -> Option<&str> {
        self.deprecation_links.get(version).map(String::as_str)
    }

    pub fn enforce_sunset(&self) -> bool {
        self.enforce_sunset
    }

    pub fn send_version_header(&self) -> bool {
        self.send_version_header
    }

    pub fn emit_warning(&self) -> bool {
        self.emit_warning
    }

    pub fn deprecated_use_callback(&self) -> Option<&DeprecatedUseCallback> {
        self.deprecated_use_callback.as_ref()
    }

    pub fn observer(&self) -> Option<&Arc<dyn VersionObserver>> {
        self.observer.as_ref()
    }

    /// Current time according to the configured clock.
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Whether `candidate` passes the whitelist gate.
    ///
    /// Matching is exact and case-sensitive.
    pub fn is_valid_version(&self, candidate: &str) -> bool {
        !candidate.is_empty()
            && (self.valid_versions.is_empty()
                || self.valid_versions.iter().any(|v| v == candidate))
    }

    /// Strategies that are enabled, in priority order.
    pub fn enabled_strategies(&self) -> Vec<Strategy> {
        Strategy::PRIORITY
            .into_iter()
            .filter(|s| match s {
                Strategy::Custom => self.custom_detector.is_some(),
                Strategy::Path => self.detection.path.is_some(),
                Strategy::Header => self.detection.header.is_some(),
                Strategy::Accept => self.detection.accept.is_some(),
                Strategy::Query => self.detection.query.is_some(),
            })
            .collect()
    }
}

impl fmt::Debug for VersioningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersioningConfig")
            .field("detection", &self.detection)
            .field("custom_detector", &self.custom_detector.is_some())
            .field("default_version", &self.default_version)
            .field("valid_versions", &self.valid_versions)
            .field("deprecated_versions", &self.deprecated_versions)
            .field("deprecation_links", &self.deprecation_links)
            .field("enforce_sunset", &self.enforce_sunset)
            .field("send_version_header", &self.send_version_header)
            .field("emit_warning", &self.emit_warning)
            .field(
                "deprecated_use_callback",
                &self.deprecated_use_callback.is_some(),
            )
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Builder for [`VersioningConfig`].
#[derive(Default)]
pub struct VersioningConfigBuilder {
    config: VersioningConfig,
    errors: Vec<ConfigError>,
}

impl VersioningConfigBuilder {
    /// Detect the version from a path segment, e.g. `"/v{version}/"`.
    pub fn path_detection(mut self, pattern: impl AsRef<str>) -> Self {
        let pattern = pattern.as_ref();
        match VersionPattern::parse(pattern) {
            Ok(parsed) => self.config.detection.path = Some(parsed),
            Err(e) => self
                .errors
                .push(ConfigError::from_pattern("path_detection", pattern, e)),
        }
        self
    }

    /// Detect the version from a request header. Surrounding whitespace is
    /// trimmed; the rest must be a valid HTTP header name.
    pub fn header_detection(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            self.errors.push(ConfigError::EmptyHeaderName);
        } else if HeaderName::from_bytes(name.as_bytes()).is_err() {
            self.errors.push(ConfigError::InvalidHeaderName {
                name: name.to_string(),
            });
        } else {
            self.config.detection.header = Some(name.to_string());
        }
        self
    }

    /// Detect the version from a query parameter.
    pub fn query_detection(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            self.errors.push(ConfigError::EmptyQueryParam);
        } else {
            self.config.detection.query = Some(name);
        }
        self
    }

    /// Detect the version from the `Accept` header, e.g.
    /// `"application/vnd.api.{version}+json"`.
    pub fn accept_detection(mut self, pattern: impl AsRef<str>) -> Self {
        let pattern = pattern.as_ref();
        match VersionPattern::parse(pattern) {
            Ok(parsed) => self.config.detection.accept = Some(parsed),
            Err(e) => self
                .errors
                .push(ConfigError::from_pattern("accept_detection", pattern, e)),
        }
        self
    }

    /// Consult `detector` before every built-in strategy.
    pub fn custom_detector(
        mut self,
        detector: impl Fn(&dyn RequestView) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.config.custom_detector = Some(Arc::new(detector));
        self
    }

    pub fn default_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        if version.is_empty() {
            self.errors.push(ConfigError::EmptyDefaultVersion);
        } else {
            self.config.default_version = version;
        }
        self
    }

    /// Restrict detection to a closed set of versions. Repeated calls extend
    /// the set; duplicates are ignored.
    pub fn valid_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for version in versions {
            let version = version.into();
            if version.is_empty() {
                self.errors.push(ConfigError::EmptyValidVersion);
            } else if !self.config.valid_versions.contains(&version) {
                self.config.valid_versions.push(version);
            }
        }
        self
    }

    /// Mark `version` deprecated, to be removed after `sunset`.
    pub fn deprecate(mut self, version: impl Into<String>, sunset: DateTime<Utc>) -> Self {
        let version = version.into();
        if version.is_empty() {
            self.errors.push(ConfigError::EmptyDeprecatedVersion);
        } else {
            self.config.deprecated_versions.insert(version, sunset);
        }
        self
    }

    /// Documentation URL advertised in the `Link` header for `version`.
    pub fn deprecation_link(mut self, version: impl Into<String>, url: impl Into<String>) -> Self {
        let (version, url) = (version.into(), url.into());
        if version.is_empty() {
            self.errors.push(ConfigError::EmptyLinkVersion);
        } else if url.is_empty() {
            self.errors.push(ConfigError::EmptyDeprecationLink { version });
        } else {
            self.config.deprecation_links.insert(version, url);
        }
        self
    }

    pub fn enforce_sunset(mut self, enabled: bool) -> Self {
        self.config.enforce_sunset = enabled;
        self
    }

    pub fn send_version_header(mut self, enabled: bool) -> Self {
        self.config.send_version_header = enabled;
        self
    }

    pub fn emit_warning(mut self, enabled: bool) -> Self {
        self.config.emit_warning = enabled;
        self
    }

    /// Called off the request path whenever a deprecated version is served.
    pub fn on_deprecated_use(
        mut self,
        callback: impl Fn(&str, &str) + Send + Sync + 'static,
    ) -> Self {
        self.config.deprecated_use_callback = Some(Arc::new(callback));
        self
    }

    pub fn clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.config.clock = Arc::new(clock);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn VersionObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<VersioningConfig, ConfigError> {
        let Self { config, mut errors } = self;

        if let Err(e) = config.validate() {
            for error in e.errors() {
                if !errors.contains(error) {
                    errors.push(error.clone());
                }
            }
        }
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        let now = config.now();
        for (version, sunset) in &config.deprecated_versions {
            if *sunset < now {
                warn!(
                    version = %version,
                    sunset = %sunset,
                    "Sunset date is in the past but version is still configured as deprecated"
                );
            }
        }
        for version in config.deprecation_links.keys() {
            if !config.deprecated_versions.contains_key(version) {
                warn!(
                    version = %version,
                    "Deprecation link configured for a version that is not deprecated"
                );
            }
        }

        Ok(config)
    }
}
