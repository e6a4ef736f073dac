//! Periodic callback component.
//!
//! Not a stability-critical scheduler: firing chains off the monotonic
//! clock with no drift correction beyond `last + period`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::node::Component;

/// Snapshot handed to a timer callback at each firing.
#[derive(Debug, Clone)]
pub struct TimerEvent {
    /// When the previous firing should have happened.
    pub last_expected: Instant,
    /// When this firing should have happened.
    pub current_expected: Instant,
    /// When the previous firing actually happened.
    pub last_real: Instant,
    /// When this firing actually happened.
    pub current_real: Instant,
    /// Actual elapsed time since the previous firing.
    pub last_duration: Duration,
}

pub type TimerCallback = Box<dyn Fn(&TimerEvent) + Send + Sync>;

/// Fires its callback once per period while spun.
pub struct Timer {
    period: Duration,
    callback: TimerCallback,
    event: Mutex<TimerEvent>,
    shutdown_flag: AtomicBool,
}

impl Timer {
    pub fn new(period: Duration, callback: impl Fn(&TimerEvent) + Send + Sync + 'static) -> Self {
        let now = Instant::now();
        Self {
            period,
            callback: Box::new(callback),
            event: Mutex::new(TimerEvent {
                last_expected: now,
                current_expected: now,
                last_real: now,
                current_real: now,
                last_duration: Duration::ZERO,
            }),
            shutdown_flag: AtomicBool::new(false),
        }
    }

    pub fn ok(&self) -> bool {
        !self.shutdown_flag.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }

    /// Fire if a full period has elapsed since the last real firing.
    pub fn spin_once(&self) {
        if !self.ok() {
            return;
        }
        let now = Instant::now();
        let fired = {
            let mut event = self.event.lock();
            if now.duration_since(event.last_real) <= self.period {
                None
            } else {
                event.current_real = now;
                event.current_expected = event.last_expected + self.period;
                event.last_duration = now.duration_since(event.last_real);
                Some(event.clone())
            }
        };
        if let Some(event) = fired {
            (self.callback)(&event);
            let mut state = self.event.lock();
            state.last_real = event.current_real;
            state.last_expected = event.current_expected;
        }
    }
}

impl Component for Timer {
    fn ok(&self) -> bool {
        Timer::ok(self)
    }

    fn spin_once(&self) {
        Timer::spin_once(self);
    }

    fn shutdown(&self) {
        Timer::shutdown(self);
    }
}
