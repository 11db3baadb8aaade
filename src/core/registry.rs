//! Explicit dependency registry.
//!
//! Modules declare bindings on a [`Binder`]: ready instances, factories, or
//! named values. [`Injector::build`] then constructs every factory-bound
//! singleton eagerly, in registration order, so missing bindings, cycles and
//! constructor failures surface before the server accepts traffic.
//!
//! Capabilities are usually trait objects:
//!
//! ```
//! use std::sync::Arc;
//! use microboot::core::registry::{Binder, Injector};
//!
//! trait Clock: Send + Sync { fn now(&self) -> u64; }
//! struct Fixed;
//! impl Clock for Fixed { fn now(&self) -> u64 { 7 } }
//!
//! let mut binder = Binder::new();
//! binder.bind_instance::<dyn Clock>(Arc::new(Fixed));
//! let injector = Injector::from_binder(binder).unwrap();
//! assert_eq!(injector.get::<dyn Clock>().unwrap().now(), 7);
//! ```
use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::HashMap,
    fmt,
    sync::Arc,
};

use crate::ports::Module;

type Instance = Box<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn(&Resolver<'_>) -> eyre::Result<Instance> + Send + Sync>;

/// Identifies one binding: a type, optionally qualified by a name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<String>,
}

impl Key {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: None,
        }
    }

    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::of::<T>()
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}[\"{}\"]", self.type_name, name),
            None => f.write_str(self.type_name),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Errors raised while wiring or constructing the dependency graph.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum InjectionError {
    #[error("No binding for {key} (required by {required_by})")]
    MissingBinding { key: Key, required_by: String },

    #[error("Dependency cycle detected: {path}")]
    Cycle { path: String },

    #[error("Duplicate binding for {key}: bound by {first} and again by {second}")]
    DuplicateBinding {
        key: Key,
        first: String,
        second: String,
    },

    #[error("Failed to construct {key}: {message}")]
    Construction { key: Key, message: String },

    #[error("Module {module} failed to configure: {message}")]
    Module { module: String, message: String },

    #[error("Binding for {key} holds an unexpected type")]
    TypeMismatch { key: Key },
}

enum Binding {
    Instance(Instance),
    Factory(Factory),
}

/// Collects bindings from modules.
pub struct Binder {
    bindings: Vec<(Key, Binding)>,
    owners: HashMap<Key, String>,
    current: String,
    errors: Vec<InjectionError>,
}

impl Binder {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            owners: HashMap::new(),
            current: "<root>".to_string(),
            errors: Vec::new(),
        }
    }

    /// Bind a ready instance.
    pub fn bind_instance<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(Key::of::<T>(), Binding::Instance(Box::new(instance)))
    }

    /// Bind a ready instance under a name.
    pub fn bind_named<T>(&mut self, name: impl Into<String>, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(Key::named::<T>(name), Binding::Instance(Box::new(instance)))
    }

    /// Bind a constructor. It runs exactly once, while the injector is built,
    /// and may pull its own dependencies from the [`Resolver`].
    pub fn bind_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> eyre::Result<Arc<T>> + Send + Sync + 'static,
    {
        let factory: Factory =
            Box::new(move |resolver| factory(resolver).map(|built| Box::new(built) as Instance));
        self.insert(Key::of::<T>(), Binding::Factory(factory))
    }

    /// Bind a string property, retrievable with `property(name)`.
    pub fn bind_property(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.bind_named::<String>(name, Arc::new(value.into()))
    }

    pub fn bind_properties<I, K, V>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in properties {
            self.bind_property(name, value);
        }
        self
    }

    /// Run one module's `configure` with its bindings attributed to it.
    pub fn install(&mut self, module: &dyn Module) -> Result<(), InjectionError> {
        self.current = module.name().to_string();
        module
            .configure(self)
            .map_err(|e| InjectionError::Module {
                module: module.name().to_string(),
                message: format!("{e:#}"),
            })
    }

    fn insert(&mut self, key: Key, binding: Binding) -> &mut Self {
        if let Some(first) = self.owners.get(&key) {
            self.errors.push(InjectionError::DuplicateBinding {
                key,
                first: first.clone(),
                second: self.current.clone(),
            });
            return self;
        }
        self.owners.insert(key.clone(), self.current.clone());
        self.bindings.push((key, binding));
        self
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

/// Dependency lookups available to factories while the graph is being built.
pub struct Resolver<'a> {
    factories: &'a HashMap<Key, Factory>,
    built: RefCell<HashMap<Key, Instance>>,
    stack: RefCell<Vec<Key>>,
}

impl Resolver<'_> {
    pub fn get<T>(&self) -> Result<Arc<T>, InjectionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve(Key::of::<T>())
    }

    pub fn named<T>(&self, name: &str) -> Result<Arc<T>, InjectionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve(Key::named::<T>(name))
    }

    pub fn property(&self, name: &str) -> Result<String, InjectionError> {
        self.named::<String>(name).map(|value| value.as_ref().clone())
    }

    fn resolve<T>(&self, key: Key) -> Result<Arc<T>, InjectionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_key(&key)?;
        downcast(self.built.borrow().get(&key), &key)
    }

    fn resolve_key(&self, key: &Key) -> Result<(), InjectionError> {
        if self.built.borrow().contains_key(key) {
            return Ok(());
        }

        let Some(factory) = self.factories.get(key) else {
            return Err(InjectionError::MissingBinding {
                key: key.clone(),
                required_by: self.requirer(),
            });
        };

        let cycle_start = self.stack.borrow().iter().position(|k| k == key);
        if let Some(start) = cycle_start {
            let stack = self.stack.borrow();
            let path = stack[start..]
                .iter()
                .chain(std::iter::once(key))
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(InjectionError::Cycle { path });
        }

        self.stack.borrow_mut().push(key.clone());
        let outcome = factory(self);
        self.stack.borrow_mut().pop();

        let instance = outcome.map_err(|report| match report.downcast::<InjectionError>() {
            Ok(inner) => inner,
            Err(report) => InjectionError::Construction {
                key: key.clone(),
                message: format!("{report:#}"),
            },
        })?;

        tracing::debug!("Constructed singleton {}", key);
        self.built.borrow_mut().insert(key.clone(), instance);
        Ok(())
    }

    fn requirer(&self) -> String {
        self.stack
            .borrow()
            .last()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<injector>".to_string())
    }
}

fn downcast<T>(instance: Option<&Instance>, key: &Key) -> Result<Arc<T>, InjectionError>
where
    T: ?Sized + Send + Sync + 'static,
{
    instance
        .and_then(|boxed| (**boxed).downcast_ref::<Arc<T>>())
        .cloned()
        .ok_or_else(|| InjectionError::TypeMismatch { key: key.clone() })
}

/// The fully constructed, immutable dependency graph.
pub struct Injector {
    instances: HashMap<Key, Instance>,
}

impl Injector {
    /// Install every module, then construct all bindings.
    pub fn build(modules: &[Box<dyn Module>]) -> Result<Self, InjectionError> {
        let mut binder = Binder::new();
        for module in modules {
            binder.install(module.as_ref())?;
        }
        Self::from_binder(binder)
    }

    pub fn from_binder(binder: Binder) -> Result<Self, InjectionError> {
        let Binder {
            bindings, errors, ..
        } = binder;
        if let Some(first) = errors.into_iter().next() {
            return Err(first);
        }

        let mut built = HashMap::new();
        let mut factories = HashMap::new();
        let mut order = Vec::new();
        for (key, binding) in bindings {
            match binding {
                Binding::Instance(instance) => {
                    built.insert(key, instance);
                }
                Binding::Factory(factory) => {
                    order.push(key.clone());
                    factories.insert(key, factory);
                }
            }
        }

        let resolver = Resolver {
            factories: &factories,
            built: RefCell::new(built),
            stack: RefCell::new(Vec::new()),
        };
        for key in &order {
            resolver.resolve_key(key)?;
        }

        Ok(Self {
            instances: resolver.built.into_inner(),
        })
    }

    pub fn get<T>(&self) -> Result<Arc<T>, InjectionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.lookup(Key::of::<T>())
    }

    pub fn named<T>(&self, name: &str) -> Result<Arc<T>, InjectionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.lookup(Key::named::<T>(name))
    }

    pub fn property(&self, name: &str) -> Result<String, InjectionError> {
        self.named::<String>(name).map(|value| value.as_ref().clone())
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.instances.contains_key(&Key::of::<T>())
    }

    fn lookup<T>(&self, key: Key) -> Result<Arc<T>, InjectionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.instances.get(&key) {
            Some(instance) => downcast(Some(instance), &key),
            None => Err(InjectionError::MissingBinding {
                key,
                required_by: "<injector>".to_string(),
            }),
        }
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.instances.keys()).finish()
    }
}
