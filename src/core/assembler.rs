//! Turns an [`Application`] plus the effective configuration into the
//! constructed dependency graph and the singleton set served over HTTP.
use std::sync::Arc;

use eyre::Result;

use crate::{
    adapters::JsonProvider,
    config::EffectiveConfig,
    core::{
        application::{Application, Singleton, SingletonSet},
        registry::{Binder, InjectionError, Injector},
    },
    ports::Module,
};

/// Application assembly errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("Modules may not be empty")]
    EmptyModules,

    #[error("Service instances may not be empty")]
    EmptyServices,

    #[error("Dependency resolution failed: {0}")]
    Injection(#[from] InjectionError),

    #[error("Failed to obtain service instances: {0}")]
    Services(String),

    #[error("Failed to obtain providers: {0}")]
    Providers(String),
}

/// Framework module installed alongside the application's modules.
///
/// Binds every effective property by name, the [`EffectiveConfig`] itself and
/// the shared [`JsonProvider`].
pub struct BootstrapModule {
    config: Arc<EffectiveConfig>,
    json: Arc<JsonProvider>,
}

impl BootstrapModule {
    pub fn new(config: Arc<EffectiveConfig>) -> Self {
        Self {
            config,
            json: Arc::new(JsonProvider::new()),
        }
    }
}

impl Module for BootstrapModule {
    fn name(&self) -> &str {
        "BootstrapModule"
    }

    fn configure(&self, binder: &mut Binder) -> Result<()> {
        binder
            .bind_properties(self.config.properties())
            .bind_instance(self.config.clone())
            .bind_instance(self.json.clone());
        Ok(())
    }
}

/// Result of a successful assembly.
#[derive(Debug)]
pub struct Assembly {
    /// Names of every installed module, the framework module last.
    pub modules: Vec<String>,
    pub injector: Arc<Injector>,
    pub singletons: SingletonSet,
}

pub struct ServiceAssembler;

impl ServiceAssembler {
    /// Validate the application's modules and services, build the injector
    /// (constructing every bound singleton) and collect the singleton set.
    pub fn assemble(
        application: &dyn Application,
        config: Arc<EffectiveConfig>,
    ) -> Result<Assembly, AssemblyError> {
        let mut modules = application.modules();
        if modules.is_empty() {
            return Err(AssemblyError::EmptyModules);
        }
        modules.push(Box::new(BootstrapModule::new(config)));

        let module_names = modules.iter().map(|m| m.name().to_string()).collect();
        let injector = Injector::build(&modules)?;

        let services = application
            .service_instances(&injector)
            .map_err(|e| AssemblyError::Services(format!("{e:#}")))?;
        if services.is_empty() {
            return Err(AssemblyError::EmptyServices);
        }

        let json = injector.get::<JsonProvider>()?;
        let providers = application
            .providers(&injector)
            .map_err(|e| AssemblyError::Providers(format!("{e:#}")))?;

        let mut singletons = SingletonSet::new();
        for service in services {
            singletons.insert(Singleton::Resource(service));
        }
        singletons.insert(Singleton::Provider(json));
        for provider in providers {
            singletons.insert(Singleton::Provider(provider));
        }

        tracing::info!(
            modules = ?module_names,
            singletons = singletons.len(),
            "Application assembled"
        );

        Ok(Assembly {
            modules: module_names,
            injector: Arc::new(injector),
            singletons,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;

    use super::*;
    use crate::{
        config::Overrides,
        ports::{Provider, Resource},
    };

    trait Clock: Send + Sync {
        fn label(&self) -> String;
    }

    struct ConfiguredClock {
        zone: String,
    }

    impl Clock for ConfiguredClock {
        fn label(&self) -> String {
            self.zone.clone()
        }
    }

    struct ClockResource {
        clock: Arc<dyn Clock>,
    }

    impl Resource for ClockResource {
        fn routes(self: Arc<Self>) -> Router {
            Router::new()
        }
    }

    struct AuditProvider;

    impl Provider for AuditProvider {
        fn attach(self: Arc<Self>, router: Router) -> Router {
            router
        }
    }

    struct ClockModule;

    impl Module for ClockModule {
        fn configure(&self, binder: &mut Binder) -> Result<()> {
            binder.bind_factory::<dyn Clock, _>(|r| {
                Ok(Arc::new(ConfiguredClock {
                    zone: r.property("clock.zone")?,
                }))
            });
            Ok(())
        }
    }

    struct TestApp {
        modules: bool,
        services: bool,
        extra_provider: bool,
    }

    impl Application for TestApp {
        fn modules(&self) -> Vec<Box<dyn Module>> {
            if self.modules {
                vec![Box::new(ClockModule)]
            } else {
                Vec::new()
            }
        }

        fn service_instances(&self, injector: &Injector) -> Result<Vec<Arc<dyn Resource>>> {
            if !self.services {
                return Ok(Vec::new());
            }
            Ok(vec![Arc::new(ClockResource {
                clock: injector.get::<dyn Clock>()?,
            })])
        }

        fn providers(&self, _injector: &Injector) -> Result<Vec<Arc<dyn Provider>>> {
            if self.extra_provider {
                Ok(vec![Arc::new(AuditProvider)])
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn config() -> Arc<EffectiveConfig> {
        Arc::new(EffectiveConfig::new(
            [("clock.zone".to_string(), "UTC".to_string())].into(),
            Overrides::new(),
        ))
    }

    fn app(modules: bool, services: bool, extra_provider: bool) -> TestApp {
        TestApp {
            modules,
            services,
            extra_provider,
        }
    }

    #[test]
    fn test_assembly_adds_framework_pieces() {
        let assembly = ServiceAssembler::assemble(&app(true, true, false), config()).unwrap();

        assert_eq!(assembly.modules.last().map(String::as_str), Some("BootstrapModule"));
        assert_eq!(assembly.modules.len(), 2);
        assert_eq!(assembly.singletons.len(), 2);
        assert_eq!(assembly.singletons.resources().count(), 1);
        let providers: Vec<_> = assembly.singletons.providers().map(|p| p.name().to_string()).collect();
        assert_eq!(providers, vec!["json".to_string()]);

        let clock = assembly.injector.get::<dyn Clock>().unwrap();
        assert_eq!(clock.label(), "UTC");
        assert!(assembly.injector.contains::<EffectiveConfig>());
        assert_eq!(assembly.injector.property("clock.zone").unwrap(), "UTC");
    }

    #[test]
    fn test_auxiliary_providers_included() {
        let assembly = ServiceAssembler::assemble(&app(true, true, true), config()).unwrap();
        assert_eq!(assembly.singletons.len(), 3);
        assert_eq!(assembly.singletons.providers().count(), 2);
    }

    #[test]
    fn test_shared_json_provider_is_the_bound_instance() {
        let assembly = ServiceAssembler::assemble(&app(true, true, false), config()).unwrap();
        let bound = assembly.injector.get::<JsonProvider>().unwrap();
        assert!(assembly.singletons.contains(&Singleton::Provider(bound)));
    }

    #[test]
    fn test_empty_modules_rejected() {
        let err = ServiceAssembler::assemble(&app(false, true, false), config()).unwrap_err();
        assert!(matches!(err, AssemblyError::EmptyModules));
    }

    #[test]
    fn test_empty_services_rejected() {
        let err = ServiceAssembler::assemble(&app(true, false, false), config()).unwrap_err();
        assert!(matches!(err, AssemblyError::EmptyServices));
    }

    #[test]
    fn test_resolution_failure_is_fatal() {
        let empty = Arc::new(EffectiveConfig::default());
        let err = ServiceAssembler::assemble(&app(true, true, false), empty).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Injection(InjectionError::MissingBinding { .. })
        ));
    }
}
