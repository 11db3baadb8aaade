use std::{path::PathBuf, process::ExitCode, sync::Arc};

use axum::{
    Extension, Router,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use clap::{Parser, ValueEnum};
use microboot::{
    Application, Binder, EffectiveConfig, Injector, JsonProvider, Launcher, Module, Overrides,
    PropertySource, Resource, config::source::parse_property_assignment, tracing_setup,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Port to listen on
    #[clap(long, default_value_t = 8080)]
    port: u16,

    /// Address to bind
    #[clap(long, default_value = "0.0.0.0")]
    host: String,

    /// Context path every route is mounted under
    #[clap(long, default_value = "/")]
    context_path: String,

    /// Servlet path pattern below the context path
    #[clap(long, default_value = "/*")]
    servlet_path: String,

    /// Directory property files are resolved against
    #[clap(long, default_value = ".")]
    config_root: PathBuf,

    /// Runtime property override, e.g. -D JETTY_THREAD_POOL_MAX_THREADS=200
    #[clap(short = 'D', long = "define", value_parser = parse_property_assignment)]
    properties: Vec<(String, String)>,

    /// Log filter directive (RUST_LOG wins when set)
    #[clap(long, default_value = "info")]
    log_level: String,

    #[clap(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

trait HealthCheckApi: Send + Sync {
    fn check_health(&self) -> String;
}

struct HealthCheckApiImpl;

impl HealthCheckApi for HealthCheckApiImpl {
    fn check_health(&self) -> String {
        "OK".to_string()
    }
}

#[derive(Serialize)]
struct ServiceInfo {
    name: String,
    version: &'static str,
    description: Option<String>,
}

/// `GET /v2/healthcheck` (text) and `GET /v2/info` (JSON).
struct HealthCheckResource {
    api: Arc<dyn HealthCheckApi>,
    config: Arc<EffectiveConfig>,
}

impl Resource for HealthCheckResource {
    fn name(&self) -> &str {
        "HealthCheckResource"
    }

    fn routes(self: Arc<Self>) -> Router {
        let health = self.clone();
        let info = self;
        Router::new()
            .route(
                "/v2/healthcheck",
                get(move || async move {
                    (
                        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                        health.api.check_health(),
                    )
                }),
            )
            .route(
                "/v2/info",
                get(move |Extension(json): Extension<Arc<JsonProvider>>| async move {
                    let body = ServiceInfo {
                        name: info.config.get_string_or("service.name", "microboot-demo"),
                        version: env!("CARGO_PKG_VERSION"),
                        description: info.config.get_string("service.description"),
                    };
                    json.respond(StatusCode::OK, &body).into_response()
                }),
            )
    }
}

struct HealthCheckModule;

impl Module for HealthCheckModule {
    fn name(&self) -> &str {
        "HealthCheckModule"
    }

    fn configure(&self, binder: &mut Binder) -> eyre::Result<()> {
        binder.bind_instance::<dyn HealthCheckApi>(Arc::new(HealthCheckApiImpl));
        binder.bind_factory::<HealthCheckResource, _>(|r| {
            Ok(Arc::new(HealthCheckResource {
                api: r.get::<dyn HealthCheckApi>()?,
                config: r.get::<EffectiveConfig>()?,
            }))
        });
        Ok(())
    }
}

struct DemoApplication;

impl Application for DemoApplication {
    fn modules(&self) -> Vec<Box<dyn Module>> {
        vec![Box::new(HealthCheckModule)]
    }

    fn service_instances(&self, injector: &Injector) -> eyre::Result<Vec<Arc<dyn Resource>>> {
        Ok(vec![injector.get::<HealthCheckResource>()?])
    }
}

fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("Failed to install error reporting: {e}");
    }

    let args = Args::parse();
    if let Err(e) = tracing_setup::init_tracing_with_config(
        &args.log_level,
        args.log_format == LogFormat::Json,
    ) {
        eprintln!("Error: {e:?}");
        return ExitCode::FAILURE;
    }

    let result = Launcher::new()
        .context_path(args.context_path)
        .servlet_path(args.servlet_path)
        .application(Arc::new(DemoApplication))
        .host(args.host)
        .port(args.port)
        .config_root(args.config_root)
        .overrides(Overrides::from_process(args.properties))
        .serve();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::from(1),
    }
}
