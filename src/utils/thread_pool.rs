//! Worker thread pool backing the listener.
//!
//! The pool is a multi-threaded tokio runtime sized from [`ServerTuning`]:
//! `min_threads` async workers plus up to `max_threads - min_threads` blocking
//! threads that retire after `pool_idle_timeout`. Connection and request
//! activity is counted alongside so a monitor can report on both.
use std::{
    fmt, io,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use tokio::runtime::{Builder, Handle, Runtime};

use crate::config::ServerTuning;

pub const WORKER_THREAD_NAME: &str = "microboot-worker";

/// Anything whose state can be written out as a textual report.
pub trait PoolStats: Send + Sync + 'static {
    fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// Connection and request counters updated by the listener.
#[derive(Debug, Default)]
pub struct PoolActivity {
    open_connections: AtomicUsize,
    active_requests: AtomicUsize,
    completed_requests: AtomicU64,
}

impl PoolActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.open_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.open_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_started(&self) {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_finished(&self) {
        self.active_requests.fetch_sub(1, Ordering::Relaxed);
        self.completed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::Relaxed)
    }

    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    pub fn completed_requests(&self) -> u64 {
        self.completed_requests.load(Ordering::Relaxed)
    }
}

pub struct WorkerPool {
    runtime: Option<Runtime>,
    tuning: ServerTuning,
    activity: Arc<PoolActivity>,
}

impl WorkerPool {
    /// Build the runtime. Sizing must already be validated (`min_threads >= 1`,
    /// `min_threads <= max_threads`).
    pub fn build(tuning: &ServerTuning) -> io::Result<Self> {
        let blocking = tuning.max_threads.saturating_sub(tuning.min_threads).max(1);

        let runtime = Builder::new_multi_thread()
            .worker_threads(tuning.min_threads)
            .max_blocking_threads(blocking)
            .thread_keep_alive(tuning.pool_idle_timeout)
            .thread_name(WORKER_THREAD_NAME)
            .enable_all()
            .build()?;

        tracing::info!(
            min_threads = tuning.min_threads,
            max_threads = tuning.max_threads,
            idle_timeout = %humantime::format_duration(tuning.pool_idle_timeout),
            "Worker pool started"
        );

        Ok(Self {
            runtime: Some(runtime),
            tuning: tuning.clone(),
            activity: Arc::new(PoolActivity::new()),
        })
    }

    pub fn activity(&self) -> Arc<PoolActivity> {
        self.activity.clone()
    }

    /// Handle for spawning onto the pool. `None` once the pool is shut down.
    pub fn handle(&self) -> Option<Handle> {
        self.runtime.as_ref().map(|rt| rt.handle().clone())
    }

    /// Run a future to completion on the pool from a non-async thread.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> io::Result<F::Output> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.block_on(future)),
            None => Err(io::Error::other("worker pool already shut down")),
        }
    }

    /// Observer that reads pool state without holding on to the runtime.
    pub fn stats(&self) -> Option<Arc<dyn PoolStats>> {
        let handle = self.handle()?;
        Some(Arc::new(PoolObserver {
            handle,
            tuning: self.tuning.clone(),
            activity: self.activity.clone(),
        }))
    }

    /// Stop the pool without waiting for in-flight tasks.
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            tracing::info!("Worker pool stopped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("min_threads", &self.tuning.min_threads)
            .field("max_threads", &self.tuning.max_threads)
            .field("running", &self.runtime.is_some())
            .field("activity", &self.activity)
            .finish()
    }
}

struct PoolObserver {
    handle: Handle,
    tuning: ServerTuning,
    activity: Arc<PoolActivity>,
}

impl PoolStats for PoolObserver {
    fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let metrics = self.handle.metrics();
        write!(
            out,
            "{}{{min={}, max={}, idle={}}} workers={} alive_tasks={} queued={} \
             connections={} active_requests={} completed_requests={}",
            WORKER_THREAD_NAME,
            self.tuning.min_threads,
            self.tuning.max_threads,
            humantime::format_duration(self.tuning.pool_idle_timeout),
            metrics.num_workers(),
            metrics.num_alive_tasks(),
            metrics.global_queue_depth(),
            self.activity.open_connections(),
            self.activity.active_requests(),
            self.activity.completed_requests(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn small() -> ServerTuning {
        ServerTuning {
            min_threads: 2,
            max_threads: 4,
            pool_idle_timeout: Duration::from_millis(500),
            ..ServerTuning::default()
        }
    }

    #[test]
    fn test_pool_runs_work() {
        let pool = WorkerPool::build(&small()).unwrap();
        let answer = pool.block_on(async { 40 + 2 }).unwrap();
        assert_eq!(answer, 42);
    }

    #[test]
    fn test_dump_reports_sizing_and_activity() {
        let pool = WorkerPool::build(&small()).unwrap();
        let activity = pool.activity();
        activity.connection_opened();
        activity.request_started();
        activity.request_finished();

        let mut report = String::new();
        pool.stats().unwrap().dump(&mut report).unwrap();

        assert!(report.starts_with("microboot-worker{min=2, max=4, idle=500ms}"));
        assert!(report.contains("workers=2"));
        assert!(report.contains("connections=1"));
        assert!(report.contains("active_requests=0"));
        assert!(report.contains("completed_requests=1"));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut pool = WorkerPool::build(&small()).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.handle().is_none());
        assert!(pool.stats().is_none());
        assert!(pool.block_on(async {}).is_err());
    }
}
