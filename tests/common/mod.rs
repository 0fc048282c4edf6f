use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use debounce::{Job, Timer, TimerHandle};

/// A timer that never honours cancellation.
///
/// Every scheduled callback is kept until `fire_all` runs them in scheduling
/// order, which replays the case where a timer fires after losing a race with
/// its own cancellation.
#[derive(Clone, Default)]
pub struct StubbornTimer {
    callbacks: Arc<Mutex<Vec<Job>>>,
}

impl StubbornTimer {
    pub fn scheduled(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }

    pub fn fire_all(&self) {
        let callbacks: Vec<_> = self.callbacks.lock().unwrap().drain(..).collect();
        for callback in callbacks {
            callback();
        }
    }
}

impl Timer for StubbornTimer {
    fn schedule(&self, _after: Duration, callback: Job) -> TimerHandle {
        self.callbacks.lock().unwrap().push(callback);
        TimerHandle::new(|| {})
    }
}
