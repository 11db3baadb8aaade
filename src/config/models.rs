//! Server configuration value objects.
//!
//! [`ServerConfig`] is assembled once by the launcher from literals; the thread
//! pool and connector tuning inside it can then be replaced from the override
//! layer with [`ServerTuning::resolve`].
use std::time::Duration;

use crate::config::source::PropertySource;

pub const MIN_THREADS_KEY: &str = "JETTY_THREAD_POOL_MIN_THREADS";
pub const MAX_THREADS_KEY: &str = "JETTY_THREAD_POOL_MAX_THREADS";
pub const POOL_IDLE_TIMEOUT_KEY: &str = "JETTY_THREAD_POOL_IDLE_TIMEOUT";
pub const CONNECTOR_IDLE_TIMEOUT_KEY: &str = "JETTY_CONNECTOR_IDLE_TIMEOUT";
pub const MONITOR_KEY: &str = "JETTY_THREAD_POOL_MONITOR";
pub const LOG_REQUESTS_KEY: &str = "JETTY_LOG_REQUESTS";

/// Interval between two thread pool reports.
pub const MONITOR_INTERVAL: Duration = Duration::from_millis(60_000);

/// Worker pool sizing and feature toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTuning {
    pub min_threads: usize,
    pub max_threads: usize,
    pub pool_idle_timeout: Duration,
    pub connector_idle_timeout: Duration,
    pub monitor_threads: bool,
    pub log_requests: bool,
}

impl Default for ServerTuning {
    fn default() -> Self {
        Self {
            min_threads: 10,
            max_threads: 1000,
            pool_idle_timeout: Duration::from_millis(30_000),
            connector_idle_timeout: Duration::from_millis(20_000),
            monitor_threads: true,
            log_requests: true,
        }
    }
}

impl ServerTuning {
    /// Apply overrides on top of `self`, keeping `self`'s values wherever the
    /// source has nothing usable.
    pub fn resolve(&self, source: &impl PropertySource) -> Self {
        Self {
            min_threads: count(source, MIN_THREADS_KEY, self.min_threads),
            max_threads: count(source, MAX_THREADS_KEY, self.max_threads),
            pool_idle_timeout: millis(source, POOL_IDLE_TIMEOUT_KEY, self.pool_idle_timeout),
            connector_idle_timeout: millis(
                source,
                CONNECTOR_IDLE_TIMEOUT_KEY,
                self.connector_idle_timeout,
            ),
            monitor_threads: source.get_boolean(MONITOR_KEY, self.monitor_threads),
            log_requests: source.get_boolean(LOG_REQUESTS_KEY, self.log_requests),
        }
    }
}

fn count(source: &impl PropertySource, key: &str, default: usize) -> usize {
    let fallback = i64::try_from(default).unwrap_or(i64::MAX);
    usize::try_from(source.get_integer(key, fallback)).unwrap_or(default)
}

fn millis(source: &impl PropertySource, key: &str, default: Duration) -> Duration {
    let fallback = i64::try_from(default.as_millis()).unwrap_or(i64::MAX);
    u64::try_from(source.get_integer(key, fallback))
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Fixed HTTP connector settings.
///
/// Secure scheme and port are advertised only; no TLS is terminated here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSettings {
    pub request_header_size: usize,
    pub response_header_size: usize,
    pub output_buffer_size: usize,
    pub secure_scheme: String,
    pub secure_port: u16,
    pub send_server_version: bool,
    pub send_date_header: bool,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            request_header_size: 8192,
            response_header_size: 8192,
            output_buffer_size: 32768,
            secure_scheme: "https".to_string(),
            secure_port: 8443,
            send_server_version: true,
            send_date_header: false,
        }
    }
}

/// Everything the launcher needs to know about the server it is about to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub context_path: Option<String>,
    pub servlet_path: Option<String>,
    pub port: u16,
    pub host: String,
    pub tuning: ServerTuning,
    pub connector: ConnectorSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            context_path: None,
            servlet_path: Some("/*".to_string()),
            port: 8080,
            host: "0.0.0.0".to_string(),
            tuning: ServerTuning::default(),
            connector: ConnectorSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Address the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
