pub mod dispatch;
pub mod http_server;
pub mod json_provider;
pub mod request_log;

/// Re-export commonly used types from adapters
pub use dispatch::build_dispatch;
pub use http_server::{EmbeddedServer, SERVER_VERSION};
pub use json_provider::JsonProvider;
pub use request_log::{REQUEST_LOG_PREFIX, RequestLog, TracingSink};
