//! Backend registry
//!
//! Maps a scheme to the single backend instance that serves it. The registry
//! is built once at startup and lent to the [`Manager`](crate::Manager).

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::uri::Uri;

/// Scheme → backend map
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the backend serving `scheme`, replacing any previous one
    pub fn with_backend(mut self, scheme: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        self.register(scheme, backend);
        self
    }

    /// Register the backend serving `scheme`, replacing any previous one
    pub fn register(&mut self, scheme: impl Into<String>, backend: Arc<dyn Backend>) {
        let scheme = scheme.into();
        tracing::debug!(scheme = %scheme, "registering backend");
        self.backends.insert(scheme, backend);
    }

    /// Resolve the backend for a URI's scheme
    pub fn resolve(&self, uri: &Uri) -> Result<Arc<dyn Backend>> {
        self.backends
            .get(uri.scheme())
            .cloned()
            .ok_or_else(|| Error::UnknownScheme(uri.clone()))
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[test]
    fn test_resolve_registered_scheme() {
        let backend: Arc<dyn Backend> = Arc::new(MockBackend::new());
        let registry = BackendRegistry::new().with_backend("gs", backend.clone());

        let resolved = registry.resolve(&Uri::new("gs", "bucket/key")).unwrap();
        assert!(Arc::ptr_eq(&resolved, &backend));
    }

    #[test]
    fn test_resolve_returns_same_instance_every_time() {
        let registry = BackendRegistry::new().with_backend("", Arc::new(MockBackend::new()));
        let a = registry.resolve(&Uri::local("a.txt")).unwrap();
        let b = registry.resolve(&Uri::local("b.txt")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_resolve_unknown_scheme() {
        let registry = BackendRegistry::new().with_backend("", Arc::new(MockBackend::new()));
        let result = registry.resolve(&Uri::new("gs", "bucket"));
        assert!(matches!(result, Err(Error::UnknownScheme(uri)) if uri.scheme() == "gs"));
    }

    #[test]
    fn test_schemes_sorted() {
        let registry = BackendRegistry::new()
            .with_backend("gs", Arc::new(MockBackend::new()))
            .with_backend("", Arc::new(MockBackend::new()));
        assert_eq!(registry.schemes(), vec!["", "gs"]);
    }
}
