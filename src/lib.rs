//! microboot - bootstrap layer for stand-alone HTTP microservices.
//!
//! A service describes itself as an [`Application`]: dependency modules, the
//! resources it exposes and optional property files. [`Launcher`] turns that
//! into exactly one running HTTP server per process:
//!
//! 1. thread pool and connector tuning are read from the override layer
//!    (`JETTY_THREAD_POOL_*`, `JETTY_CONNECTOR_IDLE_TIMEOUT`, `JETTY_LOG_REQUESTS`);
//! 2. the worker pool is built and, unless disabled, a monitor thread reports on
//!    it every minute;
//! 3. context path, servlet path and application are validated;
//! 4. property files are merged and the dependency graph is built eagerly;
//! 5. resources are mounted at the context and servlet path, optionally behind
//!    an access log;
//! 6. the listener is bound and the caller blocks until it stops.
//!
//! Every failure along the way is a [`FatalError`]. Nothing in this crate exits
//! the process; the binary maps a fatal error to exit status 1.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{Router, routing::get};
//! use microboot::{Application, Binder, Injector, Launcher, Module, Resource};
//!
//! struct Ping;
//!
//! impl Resource for Ping {
//!     fn routes(self: Arc<Self>) -> Router {
//!         Router::new().route("/ping", get(|| async { "pong" }))
//!     }
//! }
//!
//! struct PingModule;
//!
//! impl Module for PingModule {
//!     fn configure(&self, binder: &mut Binder) -> eyre::Result<()> {
//!         binder.bind_instance(Arc::new(Ping));
//!         Ok(())
//!     }
//! }
//!
//! struct PingApp;
//!
//! impl Application for PingApp {
//!     fn modules(&self) -> Vec<Box<dyn Module>> {
//!         vec![Box::new(PingModule)]
//!     }
//!
//!     fn service_instances(&self, injector: &Injector) -> eyre::Result<Vec<Arc<dyn Resource>>> {
//!         Ok(vec![injector.get::<Ping>()?])
//!     }
//! }
//!
//! # fn main() -> Result<(), microboot::FatalError> {
//! Launcher::new()
//!     .context_path("/")
//!     .servlet_path("/*")
//!     .application(Arc::new(PingApp))
//!     .port(8080)
//!     .serve()
//! # }
//! ```
//!
//! # Architecture
//! Traits live in `ports`, their implementations in `adapters`, assembly and
//! the dependency registry in `core`, and property handling in `config`.
pub mod config;
pub mod launcher;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{JsonProvider, REQUEST_LOG_PREFIX},
    config::{EffectiveConfig, Overrides, PropertySource, ServerTuning},
    core::{Application, Assembly, Binder, InjectionError, Injector, Resolver, ServiceAssembler},
    launcher::{FatalError, Launcher, LifecycleState, RunningServer, ShutdownHandle},
    ports::{Module, Provider, RequestLogSink, Resource},
};
