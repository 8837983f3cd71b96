//! Accumulated timing of named scopes

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeTiming {
    pub total: Duration,
    pub calls: u32,
}

#[derive(Default)]
pub struct ScopeProfiler {
    scopes: HashMap<String, ScopeTiming>,
}

impl ScopeProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time<F, R>(&mut self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        match self.scopes.get_mut(name) {
            Some(timing) => {
                timing.total += elapsed;
                timing.calls += 1;
            }
            None => {
                self.scopes.insert(
                    name.to_string(),
                    ScopeTiming {
                        total: elapsed,
                        calls: 1,
                    },
                );
            }
        }
        result
    }

    pub fn timing(&self, name: &str) -> ScopeTiming {
        self.scopes.get(name).copied().unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.scopes.clear();
    }

    /// Scopes sorted by total time, slowest first.
    pub fn report(&self) -> Vec<(&str, ScopeTiming)> {
        let mut report: Vec<_> = self
            .scopes
            .iter()
            .map(|(name, timing)| (name.as_str(), *timing))
            .collect();
        report.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_scopes_accumulate_calls() {
        let mut profiler = ScopeProfiler::new();
        let value = profiler.time("update", || 21 * 2);
        profiler.time("update", || ());
        assert_eq!(value, 42);
        assert_eq!(profiler.timing("update").calls, 2);
        assert_eq!(profiler.timing("render").calls, 0);
        assert_eq!(profiler.report().len(), 1);
    }
}
