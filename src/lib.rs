//! Debouncers that coalesce bursts of calls into a single deferred execution.
//!
//! `debounce` protects downstream work such as UI refreshes, I/O flushes or
//! rate-limited requests from being triggered too often. Each call hands the
//! debouncer a work function; the debouncer decides when the most recently
//! supplied one actually runs.
//!
//! Two strategies are provided:
//! - [`CountLimited`] runs the work once calls stop for a quiet period, or
//!   immediately when more than a fixed number of calls have been suppressed
//! - [`DurationBounded`] restarts a fixed interval on every call, and runs the
//!   work immediately on the first call made after a burst has lasted longer
//!   than a maximum duration
//!
//! Both are also available as plain callables through [`count_limited`] and
//! [`duration_bounded`].
//!
//! Time is read through the [`Clock`](clock::Clock) trait and deferred work is
//! scheduled through the [`Timer`](timer::Timer) trait, so a
//! [`ManualClock`](clock::ManualClock) can stand in for both and drive a
//! debouncer deterministically in tests.

pub mod clock;
pub mod count_limited;
pub mod duration_bounded;
pub mod error;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use count_limited::{CountLimited, count_limited};
pub use duration_bounded::{DurationBounded, duration_bounded};
pub use error::{Error, Result};
pub use timer::{PoolTimer, Timer, TimerHandle};

/// A boxed work function, as accepted by the debounced callables.
pub type Job = Box<dyn FnOnce() + Send + 'static>;
