//! Wall-clock timing of simulation ticks

use super::sample_window::SampleWindow;
use std::time::{Duration, Instant};

pub struct TickTimer {
    tick_start: Option<Instant>,
    tick_times: SampleWindow,
    ticks: u64,
}

impl TickTimer {
    pub fn new(window: usize) -> Self {
        Self {
            tick_start: None,
            tick_times: SampleWindow::new(window),
            ticks: 0,
        }
    }

    pub fn begin(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// Closes the tick opened by `begin`. Calls without a matching `begin` are ignored.
    pub fn end(&mut self) {
        if let Some(start) = self.tick_start.take() {
            self.tick_times.push(start.elapsed());
            self.ticks += 1;
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn ticks_per_second(&self) -> f64 {
        let avg = self.tick_times.average().as_secs_f64();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    pub fn tick_time_ms(&self) -> f64 {
        self.tick_times.average().as_secs_f64() * 1000.0
    }

    pub fn tick_time_range_ms(&self) -> (f64, f64) {
        let (min, max) = self.tick_times.min_max();
        (to_ms(min), to_ms(max))
    }
}

fn to_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
