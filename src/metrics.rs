//! Metrics for API version usage.
//!
//! Provides a Prometheus-backed [`VersionObserver`] plus counters for
//! deprecated-version traffic.

use crate::config::{Strategy, VersioningConfig};
use crate::observer::VersionObserver;
use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};

/// Default prefix for metric names.
pub const DEFAULT_METRICS_PREFIX: &str = "zentinel_api_versioning";

/// Metrics collector for API version detection and deprecated usage.
#[derive(Clone)]
pub struct VersionMetrics {
    /// Registry for all metrics
    registry: Registry,

    /// Counter for detected versions by winning strategy
    pub detected_total: IntCounterVec,

    /// Counter for requests that fell back to the default version
    pub missing_total: IntCounter,

    /// Counter for rejected version candidates
    pub invalid_total: IntCounter,

    /// Counter for requests served with a deprecated version
    pub deprecated_requests_total: IntCounterVec,

    /// Gauge for days until sunset for each deprecated version
    pub days_until_sunset: IntGaugeVec,
}

impl VersionMetrics {
    /// Create a new metrics collector with the given prefix.
    pub fn new(prefix: &str) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let detected_total = IntCounterVec::new(
            Opts::new(
                format!("{}_detected_total", prefix),
                "Total number of requests with a detected API version",
            ),
            &["version", "strategy"],
        )?;

        let missing_total = IntCounter::new(
            format!("{}_missing_total", prefix),
            "Total number of requests served with the default API version",
        )?;

        // Rejected tokens are client-controlled, so they are not used as labels.
        let invalid_total = IntCounter::new(
            format!("{}_invalid_total", prefix),
            "Total number of rejected API version candidates",
        )?;

        let deprecated_requests_total = IntCounterVec::new(
            Opts::new(
                format!("{}_deprecated_requests_total", prefix),
                "Total number of requests served with a deprecated API version",
            ),
            &["version", "route"],
        )?;

        let days_until_sunset = IntGaugeVec::new(
            Opts::new(
                format!("{}_days_until_sunset", prefix),
                "Days until version sunset (negative if past)",
            ),
            &["version"],
        )?;

        registry.register(Box::new(detected_total.clone()))?;
        registry.register(Box::new(missing_total.clone()))?;
        registry.register(Box::new(invalid_total.clone()))?;
        registry.register(Box::new(deprecated_requests_total.clone()))?;
        registry.register(Box::new(days_until_sunset.clone()))?;

        Ok(Self {
            registry,
            detected_total,
            missing_total,
            invalid_total,
            deprecated_requests_total,
            days_until_sunset,
        })
    }

    /// Record a request served with a deprecated version.
    pub fn record_deprecated_use(&self, version: &str, route: &str) {
        self.deprecated_requests_total
            .with_label_values(&[version, route])
            .inc();
    }

    /// Update the days until sunset gauge.
    pub fn set_days_until_sunset(&self, version: &str, days: i64) {
        self.days_until_sunset.with_label_values(&[version]).set(days);
    }

    /// Seed the sunset gauges from a configuration, using its clock.
    pub fn observe_sunsets(&self, config: &VersioningConfig) {
        let now = config.now();
        for (version, sunset) in config.deprecated_versions() {
            self.set_days_until_sunset(version, (*sunset - now).num_days());
        }
    }

    /// Get the Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl VersionObserver for VersionMetrics {
    fn on_detected(&self, version: &str, strategy: Strategy) {
        self.detected_total
            .with_label_values(&[version, strategy.as_str()])
            .inc();
    }

    fn on_missing(&self) {
        self.missing_total.inc();
    }

    fn on_invalid(&self, _attempted: &str) {
        self.invalid_total.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::VersionEngine;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    #[test]
    fn test_metrics_creation() {
        let metrics = VersionMetrics::new("test").unwrap();
        metrics.on_missing();
        assert!(metrics.encode().contains("test_missing_total 1"));
    }

    #[test]
    fn test_invalid_prefix_is_an_error() {
        assert!(VersionMetrics::new("not a metric name").is_err());
    }

    #[test]
    fn test_record_deprecated_use() {
        let metrics = VersionMetrics::new("test").unwrap();
        metrics.record_deprecated_use("v1", "users.list");

        let output = metrics.encode();
        assert!(output.contains("test_deprecated_requests_total"));
        assert!(output.contains("users.list"));
    }

    #[test]
    fn test_days_until_sunset() {
        let sunset: DateTime<Utc> = "2025-12-31T00:00:00Z".parse().unwrap();
        let config = VersioningConfig::builder()
            .deprecate("v1", sunset)
            .clock(|| "2025-12-01T00:00:00Z".parse().unwrap())
            .build()
            .unwrap();

        let metrics = VersionMetrics::new("test").unwrap();
        metrics.observe_sunsets(&config);

        let output = metrics.encode();
        assert!(output.contains("test_days_until_sunset{version=\"v1\"} 30"));
    }

    #[test]
    fn test_observer_counts_detection() {
        let metrics = Arc::new(VersionMetrics::new("test").unwrap());
        let engine = VersionEngine::new(
            VersioningConfig::builder()
                .query_detection("v")
                .valid_versions(["v1", "v2"])
                .observer(metrics.clone())
                .build()
                .unwrap(),
        );

        let request = |uri: &str| http::Request::builder().uri(uri).body(()).unwrap();
        engine.detect_version(&request("/x?v=v2"));
        engine.detect_version(&request("/x?v=v2"));
        engine.detect_version(&request("/x?v=v99"));

        let output = metrics.encode();
        assert!(output.contains("test_detected_total{strategy=\"query\",version=\"v2\"} 2"));
        assert!(output.contains("test_invalid_total 1"));
        assert!(output.contains("test_missing_total 1"));
    }
}
