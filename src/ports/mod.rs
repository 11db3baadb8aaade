pub mod http_server;
pub mod module;
pub mod request_log;
pub mod resource;

pub use http_server::HttpServer;
pub use module::Module;
pub use request_log::RequestLogSink;
pub use resource::{Provider, Resource};
