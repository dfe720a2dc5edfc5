//! Fixed-interval tick timer that drives the twin from outside the core.

use std::thread;
use std::time::{Duration, Instant};

/// A tick clock with an optional tick budget and a fixed pacing interval.
///
/// Deadlines are scheduled from the first tick, so a slow tick shortens the
/// following wait instead of drifting the whole schedule. A zero interval
/// never sleeps.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use dc_twin::sim::clock::Clock;
///
/// let mut clock = Clock::new(Some(3), Duration::ZERO);
/// let mut ticks = Vec::new();
///
/// clock.run(|tick| ticks.push(tick));
/// assert_eq!(ticks, vec![0, 1, 2]);
/// ```
#[derive(Debug)]
pub struct Clock {
    /// Ticks handed out so far
    current: u64,
    /// Tick budget; `None` runs until the caller stops
    total: Option<u64>,
    interval: Duration,
    next_deadline: Option<Instant>,
}

impl Clock {
    /// Creates a clock.
    ///
    /// # Arguments
    ///
    /// * `total` - Number of ticks to hand out, or `None` for unbounded
    /// * `interval` - Wall-clock spacing between consecutive ticks
    pub fn new(total: Option<u64>, interval: Duration) -> Self {
        Self {
            current: 0,
            total,
            interval,
            next_deadline: None,
        }
    }

    /// Ticks handed out so far.
    pub fn elapsed_ticks(&self) -> u64 {
        self.current
    }

    /// Waits for the next deadline and returns the tick number.
    ///
    /// # Returns
    ///
    /// * `Some(tick)` - The tick number (starting from 0)
    /// * `None` - If the tick budget is exhausted
    pub fn tick(&mut self) -> Option<u64> {
        if self.total.is_some_and(|total| self.current >= total) {
            return None;
        }

        let now = Instant::now();
        match self.next_deadline {
            None => self.next_deadline = Some(now + self.interval),
            Some(deadline) => {
                if deadline > now {
                    thread::sleep(deadline - now);
                }
                self.next_deadline = Some(deadline.max(now) + self.interval);
            }
        }

        let tick = self.current;
        self.current += 1;
        Some(tick)
    }

    /// Calls `f` for each remaining tick.
    pub fn run(&mut self, mut f: impl FnMut(u64)) {
        while let Some(tick) = self.tick() {
            f(tick);
        }
    }

    /// Calls `f` for each remaining tick until it returns `false`.
    pub fn run_while(&mut self, mut f: impl FnMut(u64) -> bool) {
        while let Some(tick) = self.tick() {
            if !f(tick) {
                break;
            }
        }
    }
}
