//! Monotonic time sources for the scheduler.
//!
//! The scheduler never calls `Instant::now()` directly. It asks its clock,
//! and when it has nothing to run until the next timer it asks the clock to
//! wait. `SystemClock` really waits; `VirtualClock` jumps forward instead,
//! so timer-heavy workloads run instantly and deterministically.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A monotonic clock driving timer wake-ups.
pub trait Clock {
    /// Current time.
    fn now(&self) -> Instant;

    /// Wait until `deadline` (or return immediately if it already passed).
    fn wait_until(&self, deadline: Instant);

    /// Whether waiting advances time without blocking the thread.
    fn is_virtual(&self) -> bool {
        false
    }
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wait_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Simulated time that only moves when the scheduler waits.
#[derive(Debug)]
pub struct VirtualClock {
    origin: Instant,
    elapsed: Cell<Duration>,
}

impl VirtualClock {
    /// Create a virtual clock starting at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Cell::new(Duration::ZERO),
        }
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }

    fn wait_until(&self, deadline: Instant) {
        // Time never goes backwards
        if deadline > self.now() {
            self.elapsed.set(deadline - self.origin);
        }
    }

    fn is_virtual(&self) -> bool {
        true
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn wait_until(&self, deadline: Instant) {
        (**self).wait_until(deadline)
    }

    fn is_virtual(&self) -> bool {
        (**self).is_virtual()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_clock_jumps() {
        let clock = VirtualClock::new();
        let start = clock.now();

        clock.wait_until(start + Duration::from_secs(3));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
        assert_eq!(clock.now() - start, Duration::from_secs(3));
    }

    #[test]
    fn test_virtual_clock_monotonic() {
        let clock = VirtualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(5));
        clock.wait_until(start + Duration::from_secs(1));
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn test_system_clock_past_deadline() {
        let clock = SystemClock;
        let before = clock.now();
        clock.wait_until(before);
        assert!(!clock.is_virtual());
        assert!(clock.now() >= before);
    }

    #[test]
    fn test_shared_clock() {
        let clock = Rc::new(VirtualClock::new());
        let shared: Box<dyn Clock> = Box::new(clock.clone());
        let start = shared.now();

        shared.wait_until(start + Duration::from_millis(250));
        assert!(shared.is_virtual());
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }
}
