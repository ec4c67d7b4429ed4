//! Connector registry -- a named collection of connector constructors.
//!
//! Resolution looks connector tokens up here, so adding a connector kind
//! means registering a constructor, not editing the resolver.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use super::container::ContainerConnector;
use super::engine::ContainerEngine;
use super::image::ImageConnector;
use super::inmemory::InMemoryConnector;
use super::trait_def::Connector;

/// Builds a connector from the connector-specific part of a connectable.
pub type ConnectorConstructor = Arc<dyn Fn(&str) -> Arc<dyn Connector> + Send + Sync>;

/// The process-wide registry of known connector kinds.
static GLOBAL: LazyLock<ConnectorRegistry> = LazyLock::new(ConnectorRegistry::with_defaults);

/// A collection of [`ConnectorConstructor`]s, keyed by connector name.
///
/// # Example
///
/// ```ignore
/// let mut registry = ConnectorRegistry::with_defaults();
/// registry.register("ssh", |arg| Arc::new(SshConnector::new(arg)));
/// let connectable = Connectable::resolve_with(&registry, "ssh:host")?;
/// ```
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    constructors: HashMap<String, ConnectorConstructor>,
}

impl ConnectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in connector kind, using the
    /// engine named by `BOWTIE_CONTAINER_ENGINE` (or `docker`).
    pub fn with_defaults() -> Self {
        Self::with_engine(ContainerEngine::from_env())
    }

    /// Create a registry holding every built-in connector kind, whose
    /// container connectors drive `engine`.
    pub fn with_engine(engine: ContainerEngine) -> Self {
        let mut registry = Self::new();
        let image_engine = engine.clone();
        registry.register(ImageConnector::KIND, move |arg| {
            Arc::new(ImageConnector::with_engine(arg, image_engine.clone()))
        });
        registry.register(ContainerConnector::KIND, move |arg| {
            Arc::new(ContainerConnector::with_engine(arg, engine.clone()))
        });
        registry.register(InMemoryConnector::KIND, |arg| {
            Arc::new(InMemoryConnector::new(arg))
        });
        registry
    }

    /// The process-wide registry. Built on first use and read-only after.
    pub fn global() -> &'static ConnectorRegistry {
        &GLOBAL
    }

    /// Register a constructor under `kind`.
    ///
    /// If `kind` was already registered, its constructor is replaced and
    /// the old one is returned.
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F) -> Option<ConnectorConstructor>
    where
        F: Fn(&str) -> Arc<dyn Connector> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Arc::new(constructor))
    }

    /// Look up the constructor for `kind`.
    pub fn get(&self, kind: &str) -> Option<ConnectorConstructor> {
        self.constructors.get(kind).cloned()
    }

    /// Build a connector of `kind` from `argument`, if `kind` is known.
    pub fn construct(&self, kind: &str, argument: &str) -> Option<Arc<dyn Connector>> {
        self.get(kind).map(|constructor| constructor(argument))
    }

    /// Names of all registered connector kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Return the number of registered connector kinds.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Return `true` if no connector kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Connection;
    use anyhow::Result;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FakeConnector {
        argument: String,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        fn kind(&self) -> &'static str {
            "fake"
        }

        fn argument(&self) -> &str {
            &self.argument
        }

        async fn connect(&self) -> Result<Arc<dyn Connection>> {
            anyhow::bail!("fake connectors never connect")
        }
    }

    fn fake(argument: &str) -> Arc<dyn Connector> {
        Arc::new(FakeConnector {
            argument: argument.to_string(),
        })
    }

    #[test]
    fn registry_starts_empty() {
        let registry = ConnectorRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.kinds().is_empty());
    }

    #[test]
    fn defaults_hold_builtin_kinds() {
        let registry = ConnectorRegistry::with_defaults();
        assert_eq!(registry.kinds(), vec!["container", "image", "inmemory"]);
    }

    #[test]
    fn global_matches_defaults() {
        assert_eq!(
            ConnectorRegistry::global().kinds(),
            ConnectorRegistry::with_defaults().kinds()
        );
    }

    #[test]
    fn register_and_construct() {
        let mut registry = ConnectorRegistry::new();
        assert!(registry.register("fake", fake).is_none());

        let connector = registry.construct("fake", "some-arg").unwrap();
        assert_eq!(connector.kind(), "fake");
        assert_eq!(connector.argument(), "some-arg");
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = ConnectorRegistry::new();
        registry.register("fake", fake);
        let old = registry.register("fake", fake);
        assert!(old.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn construct_missing_returns_none() {
        let registry = ConnectorRegistry::with_defaults();
        assert!(registry.get("bogus").is_none());
        assert!(registry.construct("bogus", "thing").is_none());
    }

    #[test]
    fn with_engine_reaches_container_connectors() {
        let registry = ConnectorRegistry::with_engine(ContainerEngine::new("podman"));

        for kind in [ImageConnector::KIND, ContainerConnector::KIND] {
            let connector = registry.construct(kind, "x").unwrap();
            let debug = format!("{connector:?}");
            assert!(debug.contains("podman"), "engine missing from {debug}");
        }
    }

    #[test]
    fn constructors_may_capture_state() {
        let mut registry = ConnectorRegistry::new();
        let prefix = String::from("captured-");
        registry.register("fake", move |arg| fake(&format!("{prefix}{arg}")));

        let connector = registry.construct("fake", "arg").unwrap();
        assert_eq!(connector.argument(), "captured-arg");
    }

    #[test]
    fn registry_debug_shows_kinds() {
        let debug = format!("{:?}", ConnectorRegistry::with_defaults());
        assert!(debug.contains("container"));
        assert!(debug.contains("image"));
    }
}
