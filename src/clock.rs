//! Sources of "now" for the debouncers.
//!
//! Every time reading a debouncer makes goes through a [`Clock`], so tests can
//! replace the system clock with a [`ManualClock`] and simulate arbitrary
//! elapsed durations without sleeping. `ManualClock` also implements
//! [`Timer`], firing scheduled callbacks as time is advanced, which makes a
//! whole debouncer deterministic.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{
    Job,
    timer::{Deadlines, Timer, TimerHandle},
};

/// A monotonic time source.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// The real monotonic clock, backed by [`Instant::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct ManualState {
    now: Instant,
    deadlines: Deadlines,
}

/// A clock that only moves when told to.
///
/// Clones share the same time and the same queue of scheduled callbacks.
/// Callbacks scheduled through the [`Timer`] implementation run on the thread
/// that calls [`advance`](ManualClock::advance), in due order, with the clock
/// set to each callback's due time while it runs.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Creates a manual clock starting at the current system instant.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a manual clock starting at `origin`.
    pub fn starting_at(origin: Instant) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: origin,
                deadlines: Deadlines::new(),
            })),
        }
    }

    /// Moves time forward by `by`, running every callback that becomes due.
    ///
    /// The internal lock is released while a callback runs, so callbacks may
    /// read the clock or schedule further callbacks. Those that fall inside the
    /// advanced window run during this same call.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;
        loop {
            let next = {
                let mut state = self.state.lock();
                let next = state.deadlines.pop_due(target);
                state.now = match &next {
                    Some((due, _)) => state.now.max(*due),
                    None => target,
                };
                next
            };
            match next {
                Some((_, callback)) => callback(),
                None => break,
            }
        }
    }

    /// Number of scheduled callbacks that are neither fired nor cancelled.
    pub fn pending_timers(&self) -> usize {
        self.state.lock().deadlines.len()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.lock().now
    }
}

impl Timer for ManualClock {
    fn schedule(&self, after: Duration, callback: Job) -> TimerHandle {
        let key = {
            let mut state = self.state.lock();
            let due = state.now + after;
            state.deadlines.insert(due, callback)
        };
        let state = Arc::downgrade(&self.state);
        TimerHandle::new(move || {
            if let Some(state) = state.upgrade() {
                state.lock().deadlines.remove(&key);
            }
        })
    }
}
