//! Fixed-size window of duration samples

use std::collections::VecDeque;
use std::time::Duration;

/// Keeps the most recent `capacity` samples; older ones fall off the front.
pub struct SampleWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }

    pub fn min_max(&self) -> (Duration, Duration) {
        let min = self.samples.iter().min().copied().unwrap_or_default();
        let max = self.samples.iter().max().copied().unwrap_or_default();
        (min, max)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_drops_oldest_sample() {
        let mut window = SampleWindow::new(3);
        window.push(Duration::from_millis(10));
        window.push(Duration::from_millis(20));
        window.push(Duration::from_millis(30));
        assert_eq!(window.average(), Duration::from_millis(20));

        window.push(Duration::from_millis(40));
        assert_eq!(window.len(), 3);
        assert_eq!(window.average(), Duration::from_millis(30));
        assert_eq!(
            window.min_max(),
            (Duration::from_millis(20), Duration::from_millis(40))
        );
        assert_eq!(window.latest(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn empty_window_reports_zero() {
        let window = SampleWindow::new(0);
        assert!(window.is_empty());
        assert_eq!(window.average(), Duration::ZERO);
        assert_eq!(window.min_max(), (Duration::ZERO, Duration::ZERO));
    }
}
