use std::time::{Duration, Instant};

/// Accumulated wall-clock time over a number of timed calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    elapsed: Duration,
    count: usize,
}

impl Timer {
    /// Returns the total time recorded.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns the number of timed calls.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Runs `f`, adding its duration to the total.
    pub(crate) fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.elapsed += start.elapsed();
        self.count += 1;
        out
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_timed_calls() {
        let mut timer = Timer::default();

        let value = timer.time(|| 2 + 3);
        timer.time(|| std::thread::sleep(Duration::from_millis(2)));

        assert_eq!(value, 5);
        assert_eq!(timer.count(), 2);
        assert!(timer.elapsed() >= Duration::from_millis(2));

        timer.reset();
        assert_eq!(timer, Timer::default());
    }
}
