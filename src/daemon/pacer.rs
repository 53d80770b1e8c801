//! Injectable "wait until next tick" capability.
//!
//! All waiting in the watchdog goes through [`Pacer`], so tests drive cycles
//! without real delays and a termination request can cut a wait short.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Outcome of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The full period elapsed.
    Elapsed,
    /// Shutdown was requested; the caller should unwind.
    Shutdown,
}

/// Paces the watchdog loop and the escalation grace interval.
pub trait Pacer {
    /// Block for `period`, returning early with [`Tick::Shutdown`] if a
    /// termination request arrives.
    fn wait(&mut self, period: Duration) -> Tick;

    /// Whether a termination request is pending.
    fn shutdown_requested(&self) -> bool;
}

impl<K: Pacer + ?Sized> Pacer for Box<K> {
    fn wait(&mut self, period: Duration) -> Tick {
        (**self).wait(period)
    }

    fn shutdown_requested(&self) -> bool {
        (**self).shutdown_requested()
    }
}

/// Wall-clock pacer that sleeps in short slices and watches a shutdown flag.
#[derive(Debug, Clone)]
pub struct SleepPacer {
    shutdown: Arc<AtomicBool>,
    slice: Duration,
}

impl SleepPacer {
    const DEFAULT_SLICE: Duration = Duration::from_millis(200);

    /// Pacer that stops waiting once `shutdown` is set.
    #[must_use]
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self {
            shutdown,
            slice: Self::DEFAULT_SLICE,
        }
    }

    /// Override how often the shutdown flag is checked while sleeping.
    #[must_use]
    pub fn with_slice(mut self, slice: Duration) -> Self {
        self.slice = slice.max(Duration::from_millis(1));
        self
    }
}

impl Pacer for SleepPacer {
    fn wait(&mut self, period: Duration) -> Tick {
        let deadline = Instant::now() + period;
        loop {
            if self.shutdown_requested() {
                return Tick::Shutdown;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Tick::Elapsed;
            }
            std::thread::sleep(remaining.min(self.slice));
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
