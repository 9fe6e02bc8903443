//! Virtual simulation time

/// Monotonic virtual clock, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimClock {
    time: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Current time truncated to whole seconds
    pub fn int_time(&self) -> i64 {
        self.time.floor() as i64
    }

    /// Move the clock forward; time never runs backwards
    pub fn advance(&mut self, dt: f64) {
        if dt > 0.0 {
            self.time += dt;
        }
    }

    /// Jump to an absolute time at or after the current one
    pub fn set_time(&mut self, time: f64) {
        if time > self.time {
            self.time = time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let mut clock = SimClock::new();
        clock.advance(1.5);
        clock.set_time(1.0);
        clock.advance(-3.0);
        assert_eq!(clock.time(), 1.5);
        assert_eq!(clock.int_time(), 1);
    }
}
