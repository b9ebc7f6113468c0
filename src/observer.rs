//! Passive detection callbacks.
//!
//! Observers run synchronously inside version detection, on the request
//! path. They have no error channel and must return quickly.

use crate::config::Strategy;
use std::fmt;
use std::sync::Arc;

/// Receives detection events. Every method defaults to a no-op.
pub trait VersionObserver: Send + Sync {
    /// A strategy produced a version that passed validation.
    fn on_detected(&self, _version: &str, _strategy: Strategy) {}

    /// No strategy produced a valid version; the default is used.
    fn on_missing(&self) {}

    /// A strategy produced a version rejected by the whitelist.
    fn on_invalid(&self, _attempted: &str) {}
}

type DetectedFn = Arc<dyn Fn(&str, Strategy) + Send + Sync>;
type MissingFn = Arc<dyn Fn() + Send + Sync>;
type InvalidFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Observer assembled from up to three independent closures.
#[derive(Clone, Default)]
pub struct CallbackObserver {
    detected: Option<DetectedFn>,
    missing: Option<MissingFn>,
    invalid: Option<InvalidFn>,
}

impl CallbackObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detected(mut self, f: impl Fn(&str, Strategy) + Send + Sync + 'static) -> Self {
        self.detected = Some(Arc::new(f));
        self
    }

    pub fn with_missing(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.missing = Some(Arc::new(f));
        self
    }

    pub fn with_invalid(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.invalid = Some(Arc::new(f));
        self
    }
}

impl VersionObserver for CallbackObserver {
    fn on_detected(&self, version: &str, strategy: Strategy) {
        if let Some(f) = &self.detected {
            f(version, strategy);
        }
    }

    fn on_missing(&self) {
        if let Some(f) = &self.missing {
            f();
        }
    }

    fn on_invalid(&self, attempted: &str) {
        if let Some(f) = &self.invalid {
            f(attempted);
        }
    }
}

impl fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("detected", &self.detected.is_some())
            .field("missing", &self.missing.is_some())
            .field("invalid", &self.invalid.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_callbacks_fire_independently() {
        let missing = Arc::new(AtomicUsize::new(0));
        let detected = Arc::new(Mutex::new(Vec::new()));

        let observer = {
            let missing = Arc::clone(&missing);
            let detected = Arc::clone(&detected);
            CallbackObserver::new()
                .with_missing(move || {
                    missing.fetch_add(1, Ordering::SeqCst);
                })
                .with_detected(move |version, strategy| {
                    detected
                        .lock()
                        .unwrap()
                        .push((version.to_string(), strategy));
                })
        };

        observer.on_missing();
        observer.on_detected("v2", Strategy::Header);
        // No invalid callback registered; must be a no-op.
        observer.on_invalid("v99");

        assert_eq!(missing.load(Ordering::SeqCst), 1);
        assert_eq!(
            *detected.lock().unwrap(),
            vec![("v2".to_string(), Strategy::Header)]
        );
    }

    #[test]
    fn test_debug_lists_registered_callbacks() {
        let observer = CallbackObserver::new().with_invalid(|_| {});
        let debug = format!("{:?}", observer);
        assert!(debug.contains("invalid: true"));
        assert!(debug.contains("missing: false"));
    }
}
