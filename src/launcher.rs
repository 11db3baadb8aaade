//! Server lifecycle: from literals and overrides to a running listener.
//!
//! [`Launcher`] collects the server settings, [`Launcher::start`] performs every
//! startup step and hands back a [`RunningServer`], and [`Launcher::serve`]
//! additionally blocks until the server stops. Every unrecoverable condition is
//! logged with a `FATAL:` prefix and returned as a [`FatalError`]; mapping it to
//! a process exit status is left to the caller.
use std::{
    io,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::task::JoinHandle;

use crate::{
    adapters::{EmbeddedServer, RequestLog, TracingSink, build_dispatch},
    config::{
        ConfigResolver, MONITOR_INTERVAL, Overrides, ServerConfig, ServerConfigValidator,
        ServerTuning, ValidationError,
    },
    core::{Application, Assembly, AssemblyError, Injector, ServiceAssembler},
    ports::{HttpServer, RequestLogSink},
    utils::{GracefulShutdown, ShutdownReason, ThreadPoolMonitor, WorkerPool},
};

/// Where a [`Launcher`] is in its single start/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    /// The listener stopped on request and [`RunningServer::join`] returned `Ok`.
    Stopped,
    StoppedFatal,
}

/// Unrecoverable startup or serve failures.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("Invalid server configuration: {0}")]
    Configuration(#[from] ValidationError),

    #[error("Unable to assemble application: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Unable to build worker thread pool: {0}")]
    ThreadPool(#[source] io::Error),

    #[error("Unable to start server on {addr}: {source}")]
    Start {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Unable to join server: {message}")]
    Join { message: String },
}

type SharedState = Arc<Mutex<LifecycleState>>;

fn set_state(state: &SharedState, next: LifecycleState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

fn read_state(state: &SharedState) -> LifecycleState {
    *state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn fatal(state: &SharedState, error: impl Into<FatalError>) -> FatalError {
    let error = error.into();
    tracing::error!("FATAL: {}", error);
    set_state(state, LifecycleState::StoppedFatal);
    error
}

/// Builder for one embedded server.
///
/// Setters only record values; nothing is validated until [`Launcher::start`].
///
/// ```no_run
/// use std::sync::Arc;
///
/// use microboot::{Application, Launcher};
///
/// fn run(app: Arc<dyn Application>) -> std::process::ExitCode {
///     match Launcher::new().context_path("/").servlet_path("/*").application(app).port(8080).serve() {
///         Ok(()) => std::process::ExitCode::SUCCESS,
///         Err(_) => std::process::ExitCode::FAILURE,
///     }
/// }
/// ```
pub struct Launcher {
    config: ServerConfig,
    application: Option<Arc<dyn Application>>,
    overrides: Overrides,
    config_root: PathBuf,
    request_log_sink: Arc<dyn RequestLogSink>,
    monitor_interval: Duration,
    state: SharedState,
}

impl Launcher {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            application: None,
            overrides: Overrides::new(),
            config_root: PathBuf::from("."),
            request_log_sink: Arc::new(TracingSink),
            monitor_interval: MONITOR_INTERVAL,
            state: Arc::new(Mutex::new(LifecycleState::NotStarted)),
        }
    }

    /// Path every route is mounted under. Must begin with `/`.
    pub fn context_path(mut self, context_path: impl Into<String>) -> Self {
        self.config.context_path = Some(context_path.into());
        self
    }

    /// Servlet pattern below the context path: `/*`, `/prefix/*` or `/exact`.
    pub fn servlet_path(mut self, servlet_path: impl Into<String>) -> Self {
        self.config.servlet_path = Some(servlet_path.into());
        self
    }

    pub fn application(mut self, application: Arc<dyn Application>) -> Self {
        self.application = Some(application);
        self
    }

    /// Port to listen on; `0` picks an ephemeral port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Override layer consulted for tuning keys and ahead of every property file.
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Directory property source names are resolved against.
    pub fn config_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config_root = root.into();
        self
    }

    pub fn request_log_sink(mut self, sink: Arc<dyn RequestLogSink>) -> Self {
        self.request_log_sink = sink;
        self
    }

    /// Literal tuning values the override layer is applied to.
    pub fn tuning(mut self, tuning: ServerTuning) -> Self {
        self.config.tuning = tuning;
        self
    }

    pub fn log_requests(mut self, enabled: bool) -> Self {
        self.config.tuning.log_requests = enabled;
        self
    }

    pub fn monitor_threads(mut self, enabled: bool) -> Self {
        self.config.tuning.monitor_threads = enabled;
        self
    }

    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        read_state(&self.state)
    }

    /// Run every startup step and return once the listener is accepting.
    ///
    /// Must be called from a thread that is not driving an async runtime: the
    /// worker pool is a runtime of its own.
    pub fn start(&self) -> Result<RunningServer, FatalError> {
        let tuning = self.config.tuning.resolve(&self.overrides);
        ServerConfigValidator::validate_tuning(&tuning).map_err(|e| fatal(&self.state, e))?;

        let pool = WorkerPool::build(&tuning)
            .map_err(|e| fatal(&self.state, FatalError::ThreadPool(e)))?;
        let monitor = match pool.stats() {
            Some(stats) if tuning.monitor_threads => Some(
                ThreadPoolMonitor::start(stats, self.monitor_interval)
                    .map_err(|e| fatal(&self.state, FatalError::ThreadPool(e)))?,
            ),
            _ => None,
        };

        ServerConfigValidator::validate(&self.config, self.application.is_some())
            .map_err(|e| fatal(&self.state, e))?;
        let (Some(application), Some(context_path), Some(servlet_path)) = (
            self.application.as_ref(),
            self.config.context_path.as_deref(),
            self.config.servlet_path.as_deref(),
        ) else {
            return Err(fatal(
                &self.state,
                ValidationError::ValidationFailed {
                    message: "application, context path and servlet path are required".to_string(),
                },
            ));
        };

        let effective = ConfigResolver::new(self.config_root.clone()).resolve(
            &application.default_property_file(),
            application.property_files(),
            self.overrides.clone(),
        );
        let assembly = ServiceAssembler::assemble(&**application, Arc::new(effective))
            .map_err(|e| fatal(&self.state, e))?;

        let mut router = build_dispatch(&assembly.singletons, context_path, servlet_path)
            .map_err(|e| fatal(&self.state, e))?;
        if tuning.log_requests {
            router = RequestLog::new(self.request_log_sink.clone()).layer(router);
        }

        let addr = self.config.bind_addr();
        let shutdown = GracefulShutdown::new();
        let server = pool
            .block_on(EmbeddedServer::bind(
                &addr,
                router,
                &self.config.connector,
                tuning.connector_idle_timeout,
                pool.activity(),
                shutdown.shutdown_token(),
            ))
            .and_then(|bound| bound)
            .map_err(|source| {
                fatal(
                    &self.state,
                    FatalError::Start {
                        addr: addr.clone(),
                        source,
                    },
                )
            })?;
        let local_addr = server.local_addr().map_err(|source| {
            fatal(
                &self.state,
                FatalError::Start {
                    addr: addr.clone(),
                    source,
                },
            )
        })?;

        let Some(handle) = pool.handle() else {
            return Err(fatal(
                &self.state,
                FatalError::Start {
                    addr,
                    source: io::Error::other("worker pool stopped during startup"),
                },
            ));
        };
        set_state(&self.state, LifecycleState::Running);
        let task_state = self.state.clone();
        let task = handle.spawn(async move {
            let result = server.run().await;
            if result.is_err() {
                set_state(&task_state, LifecycleState::StoppedFatal);
            }
            result
        });

        tracing::info!(
            "Server started on {} (context path '{}', servlet path '{}')",
            local_addr,
            context_path,
            servlet_path
        );

        Ok(RunningServer {
            local_addr,
            assembly,
            shutdown,
            task: Some(task),
            state: self.state.clone(),
            monitor,
            pool,
        })
    }

    /// Start, stop on SIGINT or SIGTERM, and block until the server stops.
    pub fn serve(&self) -> Result<(), FatalError> {
        let server = self.start()?;
        server.listen_for_signals();
        server.join()
    }
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("config", &self.config)
            .field("has_application", &self.application.is_some())
            .field("config_root", &self.config_root)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Stops a running server from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    shutdown: GracefulShutdown,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.shutdown.trigger_shutdown(ShutdownReason::Requested);
    }
}

/// A started server. Owns the worker pool, the monitor and the listener task.
pub struct RunningServer {
    local_addr: SocketAddr,
    assembly: Assembly,
    shutdown: GracefulShutdown,
    task: Option<JoinHandle<eyre::Result<()>>>,
    state: SharedState,
    monitor: Option<ThreadPoolMonitor>,
    pool: WorkerPool,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> LifecycleState {
        read_state(&self.state)
    }

    pub fn injector(&self) -> &Arc<Injector> {
        &self.assembly.injector
    }

    pub fn monitor(&self) -> Option<&ThreadPoolMonitor> {
        self.monitor.as_ref()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Turn SIGINT and SIGTERM into a shutdown request.
    pub fn listen_for_signals(&self) {
        let Some(handle) = self.pool.handle() else {
            return;
        };
        let shutdown = self.shutdown.clone();
        handle.spawn(async move {
            if let Err(e) = shutdown.run_signal_handler().await {
                tracing::warn!("Signal handling unavailable: {:#}", e);
            }
        });
    }

    /// Block until the listener stops.
    pub fn join(mut self) -> Result<(), FatalError> {
        let result = match self.task.take() {
            Some(task) => match self.pool.block_on(task) {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(e))) => Err(format!("{e:#}")),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            None => Ok(()),
        };

        if let Some(mut monitor) = self.monitor.take() {
            monitor.shutdown();
        }
        self.pool.shutdown();

        match result {
            Ok(()) => {
                set_state(&self.state, LifecycleState::Stopped);
                tracing::info!("Server on {} stopped", self.local_addr);
                Ok(())
            }
            Err(message) => Err(fatal(&self.state, FatalError::Join { message })),
        }
    }
}

impl std::fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningServer")
            .field("local_addr", &self.local_addr)
            .field("state", &self.state())
            .field("monitor", &self.monitor)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
