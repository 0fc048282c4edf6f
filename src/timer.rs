//! Cancellable deferred callbacks.
//!
//! A [`Timer`] runs a callback once after a delay, unless the returned
//! [`TimerHandle`] is cancelled (or dropped) first. The debouncers keep at
//! most one live handle each and replace it on every call.
//!
//! [`PoolTimer`] is the default implementation. One thread sleeps until the
//! earliest deadline and hands due callbacks to a `futures` thread pool, so
//! outstanding timers cost a queue entry each and never hold a worker. The
//! pool size only bounds how many callbacks run at the same time. A callback
//! that panics is caught and logged; the worker that ran it keeps serving.

use std::{
    any::Any,
    collections::BTreeMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, OnceLock, Weak},
    thread,
    time::{Duration, Instant},
};

use futures::executor::{ThreadPool, ThreadPoolBuilder};
use parking_lot::{Condvar, Mutex};
use tracing::{error, trace};

use crate::{Error, Job, Result};

static SHARED: OnceLock<PoolTimer> = OnceLock::new();

const DEFAULT_POOL_SIZE: usize = 4;

// Upper bound on a single wait, so the deadline thread notices when the last
// `PoolTimer` sharing its queue is gone.
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// Schedules a callback to run once after a delay.
pub trait Timer: Send + Sync + 'static {
    /// Schedules `callback` to run once `after` has elapsed.
    ///
    /// Dropping or cancelling the returned handle stops the callback from
    /// running if it has not started yet.
    fn schedule(&self, after: Duration, callback: Job) -> TimerHandle;
}

/// Ownership of one scheduled callback.
///
/// The callback is cancelled when the handle is dropped. Cancellation is
/// best-effort: a callback that has already been released by its timer may
/// still run, so callers that need certainty re-validate their own state once
/// the callback starts, as the debouncers do.
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    /// Creates a handle that runs `cancel` once, when it is cancelled or
    /// dropped.
    ///
    /// [`Timer`] implementations use this to withdraw the scheduled callback.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancels the timer.
    pub fn cancel(self) {}
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

pub(crate) type DeadlineKey = (Instant, u64);

/// Callbacks ordered by due time, then by insertion order so callbacks due at
/// the same instant run in the order they were scheduled.
pub(crate) struct Deadlines {
    entries: BTreeMap<DeadlineKey, Job>,
    next_seq: u64,
}

impl Deadlines {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn insert(&mut self, due: Instant, callback: Job) -> DeadlineKey {
        let key = (due, self.next_seq);
        self.next_seq += 1;
        self.entries.insert(key, callback);
        key
    }

    pub(crate) fn remove(&mut self, key: &DeadlineKey) {
        if self.entries.remove(key).is_some() {
            trace!("timer cancelled before firing");
        }
    }

    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    /// Removes and returns the earliest callback due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<(Instant, Job)> {
        let entry = self.entries.first_entry()?;
        if entry.key().0 > now {
            return None;
        }
        let due = entry.key().0;
        Some((due, entry.remove()))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

struct Driver {
    deadlines: Mutex<Deadlines>,
    wakeup: Condvar,
}

/// Timer backed by a deadline thread and a `futures` thread pool.
///
/// [`PoolTimer::default`] shares one lazily created timer across the
/// process. Use [`PoolTimer::with_pool_size`] to give a group of debouncers
/// their own workers.
#[derive(Clone)]
pub struct PoolTimer {
    driver: Arc<Driver>,
}

impl PoolTimer {
    /// Creates a timer whose callbacks run on a dedicated pool of `size`
    /// worker threads.
    ///
    /// Any number of timers may be outstanding; `size` only limits how many
    /// callbacks run concurrently.
    pub fn with_pool_size(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::ZeroPoolSize);
        }
        let pool = ThreadPoolBuilder::new()
            .pool_size(size)
            .name_prefix("debounce-worker-")
            .create()
            .map_err(Error::ThreadPool)?;

        let driver = Arc::new(Driver {
            deadlines: Mutex::new(Deadlines::new()),
            wakeup: Condvar::new(),
        });
        let weak = Arc::downgrade(&driver);
        thread::Builder::new()
            .name("debounce-timer".into())
            .spawn(move || drive(weak, pool))
            .map_err(Error::TimerThread)?;

        Ok(Self { driver })
    }
}

impl Default for PoolTimer {
    /// Returns the shared process-wide timer.
    ///
    /// # Panics
    ///
    /// Panics if the shared timer has not been created yet and the operating
    /// system refuses to spawn its threads.
    fn default() -> Self {
        SHARED
            .get_or_init(|| {
                PoolTimer::with_pool_size(DEFAULT_POOL_SIZE).expect("Timer thread creation failed")
            })
            .clone()
    }
}

impl fmt::Debug for PoolTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolTimer")
            .field("outstanding", &self.driver.deadlines.lock().len())
            .finish()
    }
}

impl Timer for PoolTimer {
    fn schedule(&self, after: Duration, callback: Job) -> TimerHandle {
        let key = self
            .driver
            .deadlines
            .lock()
            .insert(Instant::now() + after, callback);
        self.driver.wakeup.notify_one();

        let driver = Arc::downgrade(&self.driver);
        TimerHandle::new(move || {
            if let Some(driver) = driver.upgrade() {
                driver.deadlines.lock().remove(&key);
            }
        })
    }
}

fn drive(driver: Weak<Driver>, pool: ThreadPool) {
    while let Some(driver) = driver.upgrade() {
        let mut deadlines = driver.deadlines.lock();
        let now = Instant::now();
        while let Some((_, callback)) = deadlines.pop_due(now) {
            pool.spawn_ok(async move { run_guarded(callback) });
        }
        let wait = deadlines
            .next_due()
            .map_or(IDLE_WAIT, |due| due.saturating_duration_since(now).min(IDLE_WAIT));
        driver.wakeup.wait_for(&mut deadlines, wait);
    }
    trace!("timer dropped, deadline thread exiting");
}

fn run_guarded(callback: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
        error!(panic = panic_message(&*payload), "debounced work panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
