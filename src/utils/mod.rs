pub mod graceful_shutdown;
pub mod pool_monitor;
pub mod thread_pool;

pub use graceful_shutdown::{GracefulShutdown, ShutdownReason, ShutdownToken};
pub use pool_monitor::{MonitorState, ThreadPoolMonitor};
pub use thread_pool::{PoolActivity, PoolStats, WorkerPool};
