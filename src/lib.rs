//! Zentinel API Versioning
//!
//! Detects which API version a request targets and manages the version
//! lifecycle by adding deprecation and sunset headers and signalling when a
//! version must be rejected.
//!
//! # Features
//!
//! - **Detection Strategies**: custom, path, header, `Accept` media type and
//!   query parameter, consulted in that fixed priority order
//! - **Whitelisting**: optional closed set of valid versions
//! - **Sunset Headers**: RFC 8594 compliant Sunset headers
//! - **Deprecation Headers**: Deprecation, Link, and RFC 7234 `Warning: 299`
//! - **Usage Tracking**: observer callbacks and Prometheus metrics
//!
//! # Example Configuration
//!
//! ```yaml
//! default_version: v2
//! valid_versions: [v1, v2]
//! detection:
//!   path: "/v{version}/"
//!   header: X-API-Version
//! deprecated:
//!   - version: v1
//!     sunset_at: "2025-12-31T00:00:00Z"
//!     link: https://docs.example.com/migrate-v1
//! enforce_sunset: true
//! ```

pub mod config;
pub mod engine;
pub mod extract;
pub mod headers;
pub mod metrics;
pub mod observer;
pub mod request;
pub mod settings;

pub use config::{ConfigError, Strategy, VersioningConfig, VersioningConfigBuilder};
pub use engine::{Detection, LifecycleStatus, VersionEngine};
pub use headers::HeaderSink;
pub use observer::{CallbackObserver, VersionObserver};
pub use request::RequestView;
pub use settings::VersioningSettings;
