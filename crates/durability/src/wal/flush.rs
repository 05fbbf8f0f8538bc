//! Background flush scheduler
//!
//! One named thread per open WAL. Every `interval` it runs a sync action
//! (for the WAL: flush the write buffer, then fsync the current segment)
//! independent of individual appends. The action takes the same lock as
//! append, so a flush and an append never interleave.
//!
//! # Thread Lifecycle
//!
//! - `Idle` until [`FlushScheduler::start`] spawns the thread
//! - `Running` until [`FlushScheduler::stop`]
//! - `Stopped` once `stop` has signalled the thread and joined it
//!
//! `stop` is idempotent and returns only after any in-flight tick has
//! completed, so no tick can fire after it returns. `Drop` calls it too.
//!
//! A failed tick is logged and counted, never propagated: the next tick
//! retries.

use parking_lot::{Condvar, Mutex};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, thread not yet spawned
    Idle,
    /// Thread running periodic ticks
    Running,
    /// Thread signalled and joined
    Stopped,
}

/// State shared with the background thread.
#[derive(Default)]
struct Shared {
    stop_requested: Mutex<bool>,
    wake: Condvar,
    ticks: AtomicU64,
    failures: AtomicU64,
}

/// Periodic, stoppable flush worker.
pub struct FlushScheduler {
    /// Thread name
    name: String,

    /// Time between ticks
    interval: Duration,

    shared: Arc<Shared>,

    /// Background thread handle
    handle: Mutex<Option<JoinHandle<()>>>,

    state: Mutex<SchedulerState>,
}

impl FlushScheduler {
    /// Create an idle scheduler.
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        FlushScheduler {
            name: name.into(),
            interval,
            shared: Arc::new(Shared::default()),
            handle: Mutex::new(None),
            state: Mutex::new(SchedulerState::Idle),
        }
    }

    /// Spawn the background thread running `action` every interval.
    ///
    /// `action` returns `Ok(true)` when it did work and `Ok(false)` when
    /// there was nothing to do. Calling `start` on a scheduler that is not
    /// idle does nothing.
    pub fn start<F, E>(&self, action: F) -> std::io::Result<()>
    where
        F: FnMut() -> Result<bool, E> + Send + 'static,
        E: Display,
    {
        let mut state = self.state.lock();
        if *state != SchedulerState::Idle {
            debug!(target: "seglog::flush", state = ?*state, "Flush scheduler already started");
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let handle = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_loop(&shared, interval, action))?;

        *self.handle.lock() = Some(handle);
        *state = SchedulerState::Running;

        debug!(
            target: "seglog::flush",
            thread = %self.name,
            interval_ms = interval.as_millis() as u64,
            "Flush scheduler started"
        );
        Ok(())
    }

    /// Signal the thread to stop and wait for it to exit.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == SchedulerState::Stopped {
            return;
        }

        {
            let mut stop = self.shared.stop_requested.lock();
            *stop = true;
            self.shared.wake.notify_all();
        }

        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!(target: "seglog::flush", thread = %self.name, "Flush thread panicked");
            }
        }

        *state = SchedulerState::Stopped;
        debug!(target: "seglog::flush", thread = %self.name, "Flush scheduler stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// Ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    /// Ticks whose action failed.
    pub fn failures(&self) -> u64 {
        self.shared.failures.load(Ordering::Relaxed)
    }

    /// Time between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

fn run_loop<F, E>(shared: &Shared, interval: Duration, mut action: F)
where
    F: FnMut() -> Result<bool, E>,
    E: Display,
{
    let mut consecutive_failures = 0u64;

    loop {
        {
            let mut stop = shared.stop_requested.lock();
            let deadline = Instant::now() + interval;
            while !*stop {
                if shared.wake.wait_until(&mut stop, deadline).timed_out() {
                    break;
                }
            }
            if *stop {
                break;
            }
        }

        shared.ticks.fetch_add(1, Ordering::Relaxed);
        match action() {
            Ok(_) => {
                if consecutive_failures > 0 {
                    info!(
                        target: "seglog::flush",
                        after_failures = consecutive_failures,
                        "Scheduled WAL sync recovered"
                    );
                }
                consecutive_failures = 0;
            }
            Err(e) => {
                consecutive_failures += 1;
                shared.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "seglog::flush",
                    error = %e,
                    consecutive_failures,
                    "Scheduled WAL sync failed; retrying next tick"
                );
            }
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FlushScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushScheduler")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("state", &self.state())
            .field("ticks", &self.ticks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_action(counter: &Arc<AtomicUsize>) -> impl FnMut() -> Result<bool, String> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[test]
    fn test_lifecycle_states() {
        let scheduler = FlushScheduler::new("test-flush", Duration::from_millis(5));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_action(&counter)).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_ticks_fire_periodically() {
        let scheduler = FlushScheduler::new("test-flush", Duration::from_millis(5));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_action(&counter)).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        scheduler.stop();

        assert!(counter.load(Ordering::SeqCst) >= 2);
        assert_eq!(scheduler.ticks() as usize, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn test_no_tick_after_stop() {
        let scheduler = FlushScheduler::new("test-flush", Duration::from_millis(2));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_action(&counter)).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        scheduler.stop();
        let after_stop = counter.load(Ordering::SeqCst);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let scheduler = FlushScheduler::new("test-flush", Duration::from_millis(5));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_action(&counter)).unwrap();

        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_stop_without_start() {
        let scheduler = FlushScheduler::new("test-flush", Duration::from_millis(5));
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(scheduler.ticks(), 0);
    }

    #[test]
    fn test_stop_is_prompt_with_long_interval() {
        let scheduler = FlushScheduler::new("test-flush", Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_action(&counter)).unwrap();

        let start = Instant::now();
        scheduler.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failures_are_counted_not_fatal() {
        let scheduler = FlushScheduler::new("test-flush", Duration::from_millis(2));
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        scheduler
            .start(move || {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(format!("attempt {n} failed"))
                } else {
                    Ok(true)
                }
            })
            .unwrap();

        std::thread::sleep(Duration::from_millis(100));
        scheduler.stop();

        assert!(attempts.load(Ordering::SeqCst) > 3);
        assert_eq!(scheduler.failures(), 3);
    }

    #[test]
    fn test_second_start_is_ignored() {
        let scheduler = FlushScheduler::new("test-flush", Duration::from_millis(5));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_action(&first)).unwrap();
        scheduler.start(counting_action(&second)).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        scheduler.stop();
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_stops_thread() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let scheduler = FlushScheduler::new("test-flush", Duration::from_millis(5));
            scheduler.start(counting_action(&counter)).unwrap();
        }
        let after_drop = counter.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), after_drop);
    }
}
