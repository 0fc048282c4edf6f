//! Debouncing bounded by the age of a burst.
//!
//! A [`DurationBounded`] debouncer restarts a fixed interval on every call
//! and runs the most recent work function when the interval passes quietly.
//! The first call of a burst also starts a ceiling: once `max_duration` has
//! elapsed since then, the next call runs its work function immediately.
//!
//! The ceiling is only looked at when a call arrives. A burst that goes quiet
//! just as it reaches the ceiling still waits for the interval timer that is
//! already scheduled.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    Job,
    clock::{Clock, SystemClock},
    timer::{PoolTimer, Timer, TimerHandle},
};

struct State {
    // `Some` while a burst is open.
    burst_start: Option<Instant>,
    timer: Option<TimerHandle>,
    pending: Option<Job>,
    generation: u64,
}

impl State {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            trace!("cancelling interval timer");
            timer.cancel();
        }
        self.pending = None;
        self.generation = self.generation.wrapping_add(1);
    }

    fn reset(&mut self) {
        self.burst_start = None;
        self.cancel_timer();
    }
}

struct Shared<C, T> {
    interval: Duration,
    max_duration: Duration,
    clock: C,
    timer: T,
    state: Mutex<State>,
}

impl<C, T> Shared<C, T> {
    fn fire(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            trace!("stale interval timer ignored");
            return;
        }
        let job = state.pending.take();
        state.reset();
        if let Some(job) = job {
            trace!("interval elapsed, running");
            job();
        }
    }
}

/// Debouncer that waits a fixed interval after each call, with a ceiling on
/// how long a burst may keep postponing the work.
///
/// Clones share the same state. When the last clone is dropped any pending
/// work is discarded.
pub struct DurationBounded<C: Clock = SystemClock, T: Timer = PoolTimer> {
    shared: Arc<Shared<C, T>>,
}

impl DurationBounded<SystemClock, PoolTimer> {
    /// Creates a debouncer on the system clock and the shared timer pool.
    ///
    /// A zero `max_duration` makes every call run immediately.
    pub fn new(interval: Duration, max_duration: Duration) -> Self {
        Self::with_runtime(interval, max_duration, SystemClock, PoolTimer::default())
    }
}

impl<C: Clock, T: Timer> DurationBounded<C, T> {
    /// Creates a debouncer that reads time from `clock` and schedules its
    /// interval timers on `timer`.
    pub fn with_runtime(interval: Duration, max_duration: Duration, clock: C, timer: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                interval,
                max_duration,
                clock,
                timer,
                state: Mutex::new(State {
                    burst_start: None,
                    timer: None,
                    pending: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Records a call and arranges for `f` to run.
    ///
    /// If the current burst is at least `max_duration` old, `f` runs right
    /// here and the burst is closed. Otherwise `f` replaces any pending work
    /// function and runs on the timer thread `interval` from now, unless
    /// another call comes first. Either way it runs with the debouncer locked.
    pub fn call<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        let now = shared.clock.now();
        let start = *state.burst_start.get_or_insert(now);

        state.cancel_timer();

        let age = now.saturating_duration_since(start);
        if age >= shared.max_duration {
            debug!(?age, max_duration = ?shared.max_duration, "burst ceiling reached, running now");
            state.reset();
            f();
            return;
        }

        state.pending = Some(Box::new(f));
        let generation = state.generation;
        let weak = Arc::downgrade(shared);
        state.timer = Some(shared.timer.schedule(
            shared.interval,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.fire(generation);
                }
            }),
        ));
        trace!(?age, interval = ?shared.interval, "interval timer restarted");
    }

    /// Start of the open burst, if any.
    pub fn burst_started_at(&self) -> Option<Instant> {
        self.shared.state.lock().burst_start
    }

    /// Returns `true` while a work function is waiting for its timer.
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    /// Delay restarted by every call.
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Age at which a burst stops postponing its work.
    pub fn max_duration(&self) -> Duration {
        self.shared.max_duration
    }
}

impl<C: Clock, T: Timer> Clone for DurationBounded<C, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Returns a debounced callable backed by a [`DurationBounded`] debouncer.
pub fn duration_bounded(
    interval: Duration,
    max_duration: Duration,
) -> impl Fn(Job) + Clone + Send + Sync + 'static {
    let debouncer = DurationBounded::new(interval, max_duration);
    move |f: Job| debouncer.call(f)
}
