//! API version detection and lifecycle engine.

use crate::config::{Strategy, VersioningConfig};
use crate::extract;
use crate::headers::{
    self, HeaderSink, DEPRECATION_HEADER, LINK_HEADER, SUNSET_HEADER, VERSION_HEADER,
    WARNING_HEADER,
};
use crate::request::RequestView;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of version detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub version: String,
    /// Winning strategy; `None` when the default version was used.
    pub strategy: Option<Strategy>,
}

/// Lifecycle state of a version at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStatus {
    /// Not deprecated.
    Active,
    /// Deprecated, still served.
    Deprecated { sunset: DateTime<Utc> },
    /// Past sunset with enforcement on; the caller should answer 410 Gone.
    Expired { sunset: DateTime<Utc> },
}

/// Up to two candidate tokens produced by one strategy, in preference order.
type Candidates<'r> = [Option<Cow<'r, str>>; 2];

/// API version engine.
///
/// Stateless beyond its frozen configuration; clones share it and may be
/// used from any number of request handlers concurrently.
#[derive(Clone, Debug)]
pub struct VersionEngine {
    config: Arc<VersioningConfig>,
    chain: Arc<[Strategy]>,
}

impl VersionEngine {
    /// Create an engine over a built configuration.
    pub fn new(config: VersioningConfig) -> Self {
        Self::from_shared(Arc::new(config))
    }

    /// Create an engine sharing an existing configuration.
    pub fn from_shared(config: Arc<VersioningConfig>) -> Self {
        let chain: Arc<[Strategy]> = config.enabled_strategies().into();

        info!(
            strategies = ?chain,
            default_version = %config.default_version(),
            valid_versions = config.valid_versions().len(),
            deprecated_versions = config.deprecated_versions().len(),
            "API versioning engine initialized"
        );

        Self { config, chain }
    }

    /// Read-only view of the configuration.
    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    /// Determine the version a request asks for.
    ///
    /// Never fails: when no strategy yields a valid version the configured
    /// default is returned.
    pub fn detect_version<R: RequestView>(&self, request: &R) -> String {
        self.detect(request).version
    }

    /// Like [`detect_version`](Self::detect_version); a missing request
    /// yields the default version.
    pub fn detect_version_opt<R: RequestView>(&self, request: Option<&R>) -> String {
        match request {
            Some(request) => self.detect_version(request),
            None => self.config.default_version().to_string(),
        }
    }

    /// Determine the version and the strategy that produced it.
    pub fn detect<R: RequestView>(&self, request: &R) -> Detection {
        self.detect_dyn(request)
    }

    fn detect_dyn(&self, request: &dyn RequestView) -> Detection {
        for &strategy in self.chain.iter() {
            let mut rejected = None;

            for candidate in self.candidates(strategy, request).into_iter().flatten() {
                if self.config.is_valid_version(&candidate) {
                    debug!(version = %candidate, %strategy, "API version detected");
                    if let Some(observer) = self.config.observer() {
                        observer.on_detected(&candidate, strategy);
                    }
                    return Detection {
                        version: candidate.into_owned(),
                        strategy: Some(strategy),
                    };
                }
                rejected.get_or_insert(candidate);
            }

            if let Some(attempted) = rejected {
                debug!(attempted = %attempted, %strategy, "Rejected API version candidate");
                if let Some(observer) = self.config.observer() {
                    observer.on_invalid(&attempted);
                }
            }
        }

        debug!(
            version = %self.config.default_version(),
            "No API version detected, using default"
        );
        if let Some(observer) = self.config.observer() {
            observer.on_missing();
        }

        Detection {
            version: self.config.default_version().to_string(),
            strategy: None,
        }
    }

    fn candidates<'r>(&self, strategy: Strategy, request: &'r dyn RequestView) -> Candidates<'r> {
        let detection = self.config.detection();
        let single = |token: Option<&'r str>| [token.map(Cow::Borrowed), None];

        match strategy {
            Strategy::Custom => {
                let token = self
                    .config
                    .custom_detector()
                    .and_then(|detect| detect(request))
                    .filter(|v| !v.is_empty());
                [token.map(Cow::Owned), None]
            }
            Strategy::Path => match &detection.path {
                Some(pattern) => match extract::from_path(request.path(), pattern.prefix()) {
                    Some(segment) if pattern.joins_v() => [
                        Some(Cow::Owned(format!("v{}", segment))),
                        Some(Cow::Borrowed(segment)),
                    ],
                    segment => single(segment),
                },
                None => [None, None],
            },
            Strategy::Header => single(
                detection
                    .header
                    .as_deref()
                    .and_then(|name| extract::from_headers(request.headers(), name)),
            ),
            Strategy::Accept => single(detection.accept.as_ref().and_then(|pattern| {
                let accept = extract::from_headers(request.headers(), http::header::ACCEPT.as_str())?;
                extract::from_accept(accept, pattern.prefix(), pattern.suffix())
            })),
            Strategy::Query => single(
                detection
                    .query
                    .as_deref()
                    .zip(request.raw_query())
                    .and_then(|(name, query)| extract::from_query(query, name)),
            ),
        }
    }

    /// The version token as written in the path, `"v"`-joined when the
    /// configured prefix ends in `v`.
    ///
    /// Unlike detection this does not consult the whitelist, so callers can
    /// strip an invalid version before falling back to default routing.
    pub fn extract_path_segment(&self, path: &str) -> Option<String> {
        let pattern = self.config.detection().path.as_ref()?;
        let segment = extract::from_path(path, pattern.prefix())?;

        Some(if pattern.joins_v() {
            format!("v{}", segment)
        } else {
            segment.to_string()
        })
    }

    /// Remove the prefix and version segment from `path`.
    ///
    /// `"/v2/users"` with version `"v2"` becomes `"/users"`; a version that
    /// is the whole remaining path strips to `"/"`. Paths that do not carry
    /// `version` are returned unchanged.
    ///
    /// Only the leading prefix and version segment is removed, so
    /// `"/v2/v2/users"` strips to `"/v2/users"`.
    pub fn strip_path_version(&self, path: &str, version: &str) -> String {
        let Some(pattern) = &self.config.detection().path else {
            return path.to_string();
        };
        let Some(segment) = extract::from_path(path, pattern.prefix()) else {
            return path.to_string();
        };

        let matches = segment == version
            || (pattern.joins_v() && version.strip_prefix('v') == Some(segment));
        if version.is_empty() || !matches {
            return path.to_string();
        }

        let remainder = &path[pattern.prefix().len() + segment.len()..];
        if remainder.is_empty() {
            "/".to_string()
        } else {
            remainder.to_string()
        }
    }

    /// Whether a path should be routed through the versioned route tree.
    pub fn should_apply_versioning(&self, path: &str) -> bool {
        let Some(pattern) = &self.config.detection().path else {
            return true;
        };

        extract::from_path(path, pattern.prefix()).is_some()
            || !self.config.default_version().is_empty()
    }

    /// Lifecycle state of `version` according to the configured clock.
    pub fn lifecycle_status(&self, version: &str) -> LifecycleStatus {
        let Some(sunset) = self.config.sunset_for(version) else {
            return LifecycleStatus::Active;
        };

        let now = self.config.now();
        if self.config.enforce_sunset() && now > sunset {
            LifecycleStatus::Expired { sunset }
        } else {
            LifecycleStatus::Deprecated { sunset }
        }
    }

    /// Write lifecycle headers for a response serving `version`.
    ///
    /// Returns `true` when the version is past its enforced sunset and the
    /// caller should answer with a terminal "gone" response instead of the
    /// handler output.
    pub fn set_lifecycle_headers<W: HeaderSink + ?Sized>(
        &self,
        writer: &mut W,
        version: &str,
        route: &str,
    ) -> bool {
        if self.config.send_version_header() {
            set(writer, VERSION_HEADER, version);
        }

        match self.lifecycle_status(version) {
            LifecycleStatus::Active => false,

            LifecycleStatus::Expired { sunset } => {
                set(writer, SUNSET_HEADER, &headers::format_http_date(&sunset));
                if let Some(link) = self.config.deprecation_link(version) {
                    set(writer, LINK_HEADER, &headers::link_value(link, true));
                }
                debug!(version = %version, route = %route, sunset = %sunset, "API version past sunset");
                true
            }

            LifecycleStatus::Deprecated { sunset } => {
                set(writer, DEPRECATION_HEADER, "true");
                set(writer, SUNSET_HEADER, &headers::format_http_date(&sunset));
                if let Some(link) = self.config.deprecation_link(version) {
                    set(writer, LINK_HEADER, &headers::link_value(link, false));
                }
                if self.config.emit_warning() {
                    set(writer, WARNING_HEADER, &headers::warning_value(version, &sunset));
                }
                self.dispatch_deprecated_use(version, route);
                false
            }
        }
    }

    /// Like [`set_lifecycle_headers`](Self::set_lifecycle_headers); a
    /// missing writer is a no-op returning `false`.
    pub fn set_lifecycle_headers_opt<W: HeaderSink + ?Sized>(
        &self,
        writer: Option<&mut W>,
        version: &str,
        route: &str,
    ) -> bool {
        match writer {
            Some(writer) => self.set_lifecycle_headers(writer, version, route),
            None => false,
        }
    }

    /// Run the deprecated-use callback off the request path.
    ///
    /// Fire-and-forget: nothing waits for, orders, or bounds these calls.
    /// Callers that need backpressure should queue inside the callback.
    fn dispatch_deprecated_use(&self, version: &str, route: &str) {
        let Some(callback) = self.config.deprecated_use_callback() else {
            return;
        };

        let callback = Arc::clone(callback);
        let (version, route) = (version.to_string(), route.to_string());
        let task = move || callback(&version, &route);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(task);
            }
            Err(_) => {
                if let Err(e) = std::thread::Builder::new()
                    .name("deprecated-use".to_string())
                    .spawn(task)
                {
                    warn!(error = %e, "Failed to dispatch deprecated-use callback");
                }
            }
        }
    }
}

fn set<W: HeaderSink + ?Sized>(writer: &mut W, name: &str, value: &str) {
    if !writer.set_header(name, value) {
        debug!(header = name, "Skipping header value that cannot be encoded");
    }
}
