//! Arbor Metrics - Tick timing, counters and scope profiling
//!
//! Everything here compiles down to no-op stubs unless the `metrics`
//! feature is enabled, so instrumented code costs nothing in shipping builds.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use arbor_metrics::TickTimer;
//!
//! let mut timer = TickTimer::new(120);
//! timer.begin();
//! // ... run one tick ...
//! timer.end();
//! println!("tick: {:.2}ms", timer.tick_time_ms());
//! ```

#[cfg(feature = "metrics")]
mod counters;
#[cfg(feature = "metrics")]
mod sample_window;
#[cfg(feature = "metrics")]
mod scope_profiler;
#[cfg(feature = "metrics")]
mod tick_timer;

#[cfg(feature = "metrics")]
pub use counters::Counters;
#[cfg(feature = "metrics")]
pub use sample_window::SampleWindow;
#[cfg(feature = "metrics")]
pub use scope_profiler::{ScopeProfiler, ScopeTiming};
#[cfg(feature = "metrics")]
pub use tick_timer::TickTimer;

/// Whether this build collects metrics.
pub const ENABLED: bool = cfg!(feature = "metrics");

// ============================================================================
// Macros for conditional compilation
// ============================================================================

/// Execute code only when metrics are enabled
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

/// Time a block under `$name` (the block still runs when metrics are disabled)
#[macro_export]
macro_rules! time_scope {
    ($profiler:expr, $name:expr, $body:block) => {
        $profiler.time($name, || $body)
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
mod stubs {
    use std::time::Duration;

    #[derive(Default)]
    pub struct TickTimer;

    impl TickTimer {
        pub fn new(_window: usize) -> Self { Self }
        pub fn begin(&mut self) {}
        pub fn end(&mut self) {}
        pub fn ticks(&self) -> u64 { 0 }
        pub fn ticks_per_second(&self) -> f64 { 0.0 }
        pub fn tick_time_ms(&self) -> f64 { 0.0 }
        pub fn tick_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
    }

    #[derive(Default)]
    pub struct SampleWindow;

    impl SampleWindow {
        pub fn new(_capacity: usize) -> Self { Self }
        pub fn push(&mut self, _sample: Duration) {}
        pub fn latest(&self) -> Option<Duration> { None }
        pub fn average(&self) -> Duration { Duration::ZERO }
        pub fn min_max(&self) -> (Duration, Duration) { (Duration::ZERO, Duration::ZERO) }
        pub fn len(&self) -> usize { 0 }
        pub fn is_empty(&self) -> bool { true }
        pub fn clear(&mut self) {}
    }

    #[derive(Default)]
    pub struct Counters;

    impl Counters {
        pub fn new() -> Self { Self }
        pub fn add(&mut self, _name: &'static str, _value: u64) {}
        pub fn set(&mut self, _name: &'static str, _value: u64) {}
        pub fn get(&self, _name: &str) -> u64 { 0 }
        pub fn reset(&mut self) {}
        pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ { std::iter::empty() }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ScopeTiming {
        pub total: Duration,
        pub calls: u32,
    }

    #[derive(Default)]
    pub struct ScopeProfiler;

    impl ScopeProfiler {
        pub fn new() -> Self { Self }
        pub fn time<F, R>(&mut self, _name: &str, f: F) -> R where F: FnOnce() -> R { f() }
        pub fn timing(&self, _name: &str) -> ScopeTiming { ScopeTiming::default() }
        pub fn reset(&mut self) {}
        pub fn report(&self) -> Vec<(&str, ScopeTiming)> { Vec::new() }
    }
}

#[cfg(not(feature = "metrics"))]
pub use stubs::{Counters, SampleWindow, ScopeProfiler, ScopeTiming, TickTimer};

#[cfg(test)]
mod tests {
    #[test]
    fn test_api_available_in_every_build() {
        let mut timer = super::TickTimer::new(60);
        timer.begin();
        timer.end();
        let mut counters = super::Counters::new();
        counters.add("ticks", 1);
        let mut profiler = super::ScopeProfiler::new();
        let value = time_scope!(profiler, "scope", { 3 });
        assert_eq!(value, 3);
        let _window = super::SampleWindow::new(4);
    }
}
