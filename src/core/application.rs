use std::sync::Arc;

use eyre::Result;

use crate::{
    config::DEFAULT_PROPERTY_FILE,
    core::registry::Injector,
    ports::{Module, Provider, Resource},
};

/// What a concrete microservice hands to the launcher.
///
/// `modules` and `service_instances` must both be non-empty; the framework adds
/// its own module (configuration properties, JSON provider) and its own
/// providers on top.
pub trait Application: Send + Sync + 'static {
    /// Dependency wiring for this service.
    fn modules(&self) -> Vec<Box<dyn Module>>;

    /// Endpoint implementations, typically pulled out of the injector.
    fn service_instances(&self, injector: &Injector) -> Result<Vec<Arc<dyn Resource>>>;

    /// Additional providers. None by default.
    fn providers(&self, _injector: &Injector) -> Result<Vec<Arc<dyn Provider>>> {
        Ok(Vec::new())
    }

    /// Overlay property sources, merged in order over the default source.
    fn property_files(&self) -> Vec<String> {
        Vec::new()
    }

    fn default_property_file(&self) -> String {
        DEFAULT_PROPERTY_FILE.to_string()
    }
}

/// One member of the singleton set exposed at the dispatch boundary.
#[derive(Clone)]
pub enum Singleton {
    Resource(Arc<dyn Resource>),
    Provider(Arc<dyn Provider>),
}

impl Singleton {
    pub fn name(&self) -> &str {
        match self {
            Self::Resource(resource) => resource.name(),
            Self::Provider(provider) => provider.name(),
        }
    }

    fn same_instance(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Resource(a), Self::Resource(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Self::Provider(a), Self::Provider(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Singleton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resource(_) => write!(f, "Resource({})", self.name()),
            Self::Provider(_) => write!(f, "Provider({})", self.name()),
        }
    }
}

/// Insertion-ordered set of singletons; inserting the same instance twice is a no-op.
#[derive(Clone, Debug, Default)]
pub struct SingletonSet {
    members: Vec<Singleton>,
}

impl SingletonSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if this exact instance was already present.
    pub fn insert(&mut self, singleton: Singleton) -> bool {
        if self.members.iter().any(|m| m.same_instance(&singleton)) {
            return false;
        }
        self.members.push(singleton);
        true
    }

    pub fn contains(&self, singleton: &Singleton) -> bool {
        self.members.iter().any(|m| m.same_instance(singleton))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Singleton> {
        self.members.iter()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Arc<dyn Resource>> {
        self.members.iter().filter_map(|m| match m {
            Singleton::Resource(resource) => Some(resource),
            Singleton::Provider(_) => None,
        })
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.members.iter().filter_map(|m| match m {
            Singleton::Provider(provider) => Some(provider),
            Singleton::Resource(_) => None,
        })
    }
}
