//! Debouncing bounded by the number of suppressed calls.
//!
//! A [`CountLimited`] debouncer waits for calls to stop arriving for a quiet
//! period before running the most recently supplied work function. If more
//! than `count_limit` calls pile up before that happens, the call that crosses
//! the limit runs its work function immediately on the calling thread and the
//! count starts over.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    Job,
    timer::{PoolTimer, Timer, TimerHandle},
};

// Mutable state. Every transition happens with the lock held.
struct State {
    count: u64,
    timer: Option<TimerHandle>,
    pending: Option<Job>,
    // Identifies the only timer allowed to fire.
    generation: u64,
}

impl State {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            trace!("cancelling quiet-period timer");
            timer.cancel();
        }
        self.pending = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

struct Shared<T> {
    quiet_period: Duration,
    count_limit: u64,
    timer: T,
    state: Mutex<State>,
}

impl<T> Shared<T> {
    fn fire(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            trace!("stale quiet-period timer ignored");
            return;
        }
        state.timer = None;
        let job = state.pending.take();
        trace!(calls = state.count, "quiet period elapsed, running");
        state.count = 0;
        if let Some(job) = job {
            job();
        }
    }
}

/// Debouncer that fires after a quiet period, or at once when too many calls
/// have been suppressed.
///
/// Clones share the same state. When the last clone is dropped any pending
/// work is discarded.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use debounce::CountLimited;
///
/// let debouncer = CountLimited::new(Duration::from_millis(100), 50);
/// for _ in 0..10 {
///     debouncer.call(|| println!("saving"));
/// }
/// // "saving" is printed once, 100ms after the last call.
/// # std::thread::sleep(Duration::from_millis(200));
/// ```
pub struct CountLimited<T: Timer = PoolTimer> {
    shared: Arc<Shared<T>>,
}

impl CountLimited<PoolTimer> {
    /// Creates a debouncer on the shared timer pool.
    ///
    /// A `count_limit` of zero makes every call run immediately.
    pub fn new(quiet_period: Duration, count_limit: u64) -> Self {
        Self::with_timer(quiet_period, count_limit, PoolTimer::default())
    }
}

impl<T: Timer> CountLimited<T> {
    /// Creates a debouncer that schedules its quiet-period timers on `timer`.
    pub fn with_timer(quiet_period: Duration, count_limit: u64, timer: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                quiet_period,
                count_limit,
                timer,
                state: Mutex::new(State {
                    count: 0,
                    timer: None,
                    pending: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Records a call and arranges for `f` to run.
    ///
    /// `f` replaces whatever work function an earlier call left pending. It
    /// runs either on the timer thread once the quiet period passes without
    /// another call, or right here if this call pushes the count past the
    /// limit. In both cases it runs with the debouncer locked, so it must not
    /// call back into the same debouncer.
    pub fn call<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        state.count = state.count.wrapping_add(1);

        if state.count > shared.count_limit {
            state.cancel_timer();
            debug!(limit = shared.count_limit, "call limit exceeded, running now");
            state.count = 0;
            f();
            return;
        }

        state.cancel_timer();
        state.pending = Some(Box::new(f));
        let generation = state.generation;
        let weak = Arc::downgrade(shared);
        state.timer = Some(shared.timer.schedule(
            shared.quiet_period,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.fire(generation);
                }
            }),
        ));
        trace!(
            calls = state.count,
            quiet_period = ?shared.quiet_period,
            "quiet-period timer restarted"
        );
    }

    /// Calls accumulated since the last execution.
    pub fn pending_calls(&self) -> u64 {
        self.shared.state.lock().count
    }

    /// Returns `true` while a work function is waiting for its timer.
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    /// How long calls must stop before pending work runs.
    pub fn quiet_period(&self) -> Duration {
        self.shared.quiet_period
    }

    /// Number of calls that may be suppressed before one runs immediately.
    pub fn count_limit(&self) -> u64 {
        self.shared.count_limit
    }
}

impl<T: Timer> Clone for CountLimited<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Returns a debounced callable backed by a [`CountLimited`] debouncer.
///
/// Each invocation takes the work function to run; the most recent one wins.
pub fn count_limited(
    quiet_period: Duration,
    count_limit: u64,
) -> impl Fn(Job) + Clone + Send + Sync + 'static {
    let debouncer = CountLimited::new(quiet_period, count_limit);
    move |f: Job| debouncer.call(f)
}
