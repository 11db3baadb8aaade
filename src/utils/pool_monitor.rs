//! Periodic thread pool reporter.
//!
//! A dedicated thread waits on a condition variable for up to one interval,
//! then writes the pool dump as a single log line. [`ThreadPoolMonitor::shutdown`]
//! wakes the thread immediately instead of letting it sleep out the interval.
use std::{
    io,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::utils::thread_pool::PoolStats;

pub const MONITOR_THREAD_NAME: &str = "thread-pool-monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Waiting for the next interval.
    Idle,
    /// Producing a dump.
    Reporting,
    ShutdownRequested,
}

struct Shared {
    state: Mutex<MonitorState>,
    wake: Condvar,
    reports: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ThreadPoolMonitor {
    shared: Arc<Shared>,
    interval: Duration,
    thread: Option<JoinHandle<()>>,
}

impl ThreadPoolMonitor {
    /// Spawn the monitor thread reporting on `stats` every `interval`.
    pub fn start(stats: Arc<dyn PoolStats>, interval: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(MonitorState::Idle),
            wake: Condvar::new(),
            reports: AtomicU64::new(0),
        });

        let worker = shared.clone();
        let thread = thread::Builder::new()
            .name(MONITOR_THREAD_NAME.to_string())
            .spawn(move || run(&worker, stats.as_ref(), interval))?;

        tracing::info!(
            "Thread pool monitor started, reporting every {}",
            humantime::format_duration(interval)
        );

        Ok(Self {
            shared,
            interval,
            thread: Some(thread),
        })
    }

    pub fn state(&self) -> MonitorState {
        *self.shared.lock()
    }

    /// Number of dumps written so far.
    pub fn reports(&self) -> u64 {
        self.shared.reports.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Request shutdown, wake the thread and wait for it to exit.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.lock();
            *state = MonitorState::ShutdownRequested;
        }
        self.shared.wake.notify_all();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Thread pool monitor exited with a panic");
            } else {
                tracing::info!("Thread pool monitor stopped");
            }
        }
    }
}

impl Drop for ThreadPoolMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPoolMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolMonitor")
            .field("state", &self.state())
            .field("interval", &self.interval)
            .field("reports", &self.reports())
            .finish()
    }
}

fn run(shared: &Shared, stats: &dyn PoolStats, interval: Duration) {
    let mut state = shared.lock();
    loop {
        state = shared
            .wake
            .wait_timeout_while(state, interval, |s| *s != MonitorState::ShutdownRequested)
            .map(|(guard, _)| guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner().0);

        if *state == MonitorState::ShutdownRequested {
            break;
        }
        *state = MonitorState::Reporting;
        drop(state);

        report(shared, stats);

        state = shared.lock();
        if *state == MonitorState::Reporting {
            *state = MonitorState::Idle;
        }
    }
}

fn report(shared: &Shared, stats: &dyn PoolStats) {
    let mut dump = String::new();
    match stats.dump(&mut dump) {
        Ok(()) => {
            tracing::info!("Stats {}", dump);
            shared.reports.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => tracing::warn!("Failed to dump thread pool stats: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fmt,
        sync::atomic::AtomicUsize,
        time::Instant,
    };

    use super::*;

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl PoolStats for Counting {
        fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(fmt::Error);
            }
            out.write_str("threads=1 queued=0")
        }
    }

    fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_shutdown_does_not_wait_for_interval() {
        let stats = Counting::new(false);
        let mut monitor = ThreadPoolMonitor::start(stats.clone(), Duration::from_secs(60)).unwrap();
        assert_eq!(monitor.state(), MonitorState::Idle);

        let started = Instant::now();
        monitor.shutdown();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(monitor.state(), MonitorState::ShutdownRequested);
        assert_eq!(stats.calls.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.reports(), 0);
    }

    #[test]
    fn test_reports_every_interval() {
        let stats = Counting::new(false);
        let mut monitor =
            ThreadPoolMonitor::start(stats.clone(), Duration::from_millis(10)).unwrap();

        assert!(wait_for(Duration::from_secs(5), || monitor.reports() >= 3));
        monitor.shutdown();

        let after = monitor.reports();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(monitor.reports(), after);
    }

    #[test]
    fn test_dump_failure_keeps_monitor_alive() {
        let stats = Counting::new(true);
        let mut monitor =
            ThreadPoolMonitor::start(stats.clone(), Duration::from_millis(10)).unwrap();

        assert!(wait_for(Duration::from_secs(5), || {
            stats.calls.load(Ordering::SeqCst) >= 3
        }));
        assert_eq!(monitor.reports(), 0);
        assert_ne!(monitor.state(), MonitorState::ShutdownRequested);
        monitor.shutdown();
    }
}
