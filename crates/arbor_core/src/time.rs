//! Fixed-rate simulation clock
//!
//! Every tick advances by exactly `1 / tick_rate_hz`, independent of how long
//! the tick took to run.

use crate::component::UpdateContext;
use std::time::Duration;

/// Default simulation rate.
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

#[derive(Debug, Clone)]
pub struct SimulationClock {
    tick_rate_hz: u32,
    tick_duration: Duration,
    tick_count: u64,
    elapsed: Duration,
}

impl SimulationClock {
    /// A zero rate is clamped to 1 Hz.
    pub fn new(tick_rate_hz: u32) -> Self {
        let tick_rate_hz = tick_rate_hz.max(1);
        Self {
            tick_rate_hz,
            tick_duration: Duration::from_secs(1) / tick_rate_hz,
            tick_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Advance one tick and return the context for `Collection::update`.
    pub fn tick(&mut self) -> UpdateContext {
        self.tick_count += 1;
        self.elapsed += self.tick_duration;
        UpdateContext {
            dt: self.tick_duration.as_secs_f32(),
            tick: self.tick_count,
        }
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE_HZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_advance_by_a_fixed_step() {
        let mut clock = SimulationClock::new(50);
        let first = clock.tick();
        let second = clock.tick();

        assert_eq!(first.tick, 1);
        assert_eq!(second.tick, 2);
        assert!((second.dt - 0.02).abs() < 1e-6);
        assert_eq!(clock.elapsed(), Duration::from_millis(40));
    }

    #[test]
    fn zero_rate_is_clamped() {
        let clock = SimulationClock::new(0);
        assert_eq!(clock.tick_rate_hz(), 1);
        assert_eq!(clock.tick_duration(), Duration::from_secs(1));
    }
}
