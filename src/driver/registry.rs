use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use super::types::{Domain, RegistryError};
use super::{ExtractDriver, LoadDriver, TransformDriver};

static GLOBAL: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::new()));

/// Name-to-factory mapping for each [`Domain`].
///
/// Populate it during start-up, before opening transactions. Registering a
/// name twice in the same domain is a configuration error.
#[derive(Default)]
pub struct Registry {
    extract: HashMap<String, Arc<dyn ExtractDriver>>,
    transform: HashMap<String, Arc<dyn TransformDriver>>,
    load: HashMap<String, Arc<dyn LoadDriver>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry for programs that register drivers at start-up.
    pub fn global() -> &'static RwLock<Registry> {
        &GLOBAL
    }

    pub fn register_extract(
        &mut self,
        name: impl Into<String>,
        driver: Arc<dyn ExtractDriver>,
    ) -> Result<(), RegistryError> {
        insert(&mut self.extract, Domain::Extract, name.into(), driver)
    }

    pub fn register_transform(
        &mut self,
        name: impl Into<String>,
        driver: Arc<dyn TransformDriver>,
    ) -> Result<(), RegistryError> {
        insert(&mut self.transform, Domain::Transform, name.into(), driver)
    }

    pub fn register_load(
        &mut self,
        name: impl Into<String>,
        driver: Arc<dyn LoadDriver>,
    ) -> Result<(), RegistryError> {
        insert(&mut self.load, Domain::Load, name.into(), driver)
    }

    pub fn find_extract(&self, name: &str) -> Result<Arc<dyn ExtractDriver>, RegistryError> {
        lookup(&self.extract, Domain::Extract, name)
    }

    pub fn find_transform(&self, name: &str) -> Result<Arc<dyn TransformDriver>, RegistryError> {
        lookup(&self.transform, Domain::Transform, name)
    }

    pub fn find_load(&self, name: &str) -> Result<Arc<dyn LoadDriver>, RegistryError> {
        lookup(&self.load, Domain::Load, name)
    }

    /// Registered names in `domain`, sorted.
    pub fn names(&self, domain: Domain) -> Vec<String> {
        let mut names: Vec<String> = match domain {
            Domain::Extract => self.extract.keys().cloned().collect(),
            Domain::Transform => self.transform.keys().cloned().collect(),
            Domain::Load => self.load.keys().cloned().collect(),
        };
        names.sort();
        names
    }

    /// Drops every registration.
    pub fn clear(&mut self) {
        self.extract.clear();
        self.transform.clear();
        self.load.clear();
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("extract", &self.names(Domain::Extract))
            .field("transform", &self.names(Domain::Transform))
            .field("load", &self.names(Domain::Load))
            .finish()
    }
}

fn insert<D: ?Sized>(
    drivers: &mut HashMap<String, Arc<D>>,
    domain: Domain,
    name: String,
    driver: Arc<D>,
) -> Result<(), RegistryError> {
    if drivers.contains_key(&name) {
        return Err(RegistryError::Duplicate { domain, name });
    }
    tracing::debug!(%domain, %name, "driver registered");
    drivers.insert(name, driver);
    Ok(())
}

fn lookup<D: ?Sized>(
    drivers: &HashMap<String, Arc<D>>,
    domain: Domain,
    name: &str,
) -> Result<Arc<D>, RegistryError> {
    drivers
        .get(name)
        .cloned()
        .ok_or_else(|| RegistryError::NotFound {
            domain,
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverError, Extract, Load, Transform};
    use async_trait::async_trait;

    struct StubDriver;

    #[async_trait]
    impl ExtractDriver for StubDriver {
        async fn open(&self, _name: &str, _source: &str) -> Result<Box<dyn Extract>, DriverError> {
            Err(DriverError::message("stub"))
        }
    }

    #[async_trait]
    impl TransformDriver for StubDriver {
        async fn open(&self, _name: &str, _source: &str) -> Result<Box<dyn Transform>, DriverError> {
            Err(DriverError::message("stub"))
        }
    }

    #[async_trait]
    impl LoadDriver for StubDriver {
        async fn open(&self, _name: &str, _source: &str) -> Result<Box<dyn Load>, DriverError> {
            Err(DriverError::message("stub"))
        }
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = Registry::new();
        registry.register_extract("csv", Arc::new(StubDriver)).unwrap();

        let err = registry
            .register_extract("csv", Arc::new(StubDriver))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Duplicate { domain: Domain::Extract, ref name } if name == "csv"
        ));
    }

    #[test]
    fn test_distinct_names_are_independently_found() {
        let mut registry = Registry::new();
        registry.register_load("pg", Arc::new(StubDriver)).unwrap();
        registry.register_load("mongo", Arc::new(StubDriver)).unwrap();

        assert!(registry.find_load("pg").is_ok());
        assert!(registry.find_load("mongo").is_ok());
        assert_eq!(registry.names(Domain::Load), vec!["mongo", "pg"]);
    }

    #[test]
    fn test_same_name_in_different_domains() {
        let mut registry = Registry::new();
        registry.register_extract("sql", Arc::new(StubDriver)).unwrap();
        registry.register_transform("sql", Arc::new(StubDriver)).unwrap();
        registry.register_load("sql", Arc::new(StubDriver)).unwrap();

        assert!(registry.find_extract("sql").is_ok());
        assert!(registry.find_transform("sql").is_ok());
        assert!(registry.find_load("sql").is_ok());
    }

    #[test]
    fn test_find_missing_driver() {
        let registry = Registry::new();
        assert!(matches!(
            registry.find_transform("nope"),
            Err(RegistryError::NotFound { domain: Domain::Transform, .. })
        ));
    }

    #[test]
    fn test_clear_resets_registrations() {
        let mut registry = Registry::new();
        registry.register_extract("csv", Arc::new(StubDriver)).unwrap();
        registry.clear();

        assert!(registry.find_extract("csv").is_err());
        assert!(registry.register_extract("csv", Arc::new(StubDriver)).is_ok());
    }

    #[test]
    fn test_global_registry() {
        let name = "global-registry-test";
        {
            let mut registry = Registry::global().write().unwrap();
            registry.register_extract(name, Arc::new(StubDriver)).unwrap();
        }
        let registry = Registry::global().read().unwrap();
        assert!(registry.find_extract(name).is_ok());
        assert!(format!("{:?}", *registry).contains(name));
    }
}
