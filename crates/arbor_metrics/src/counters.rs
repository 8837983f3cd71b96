//! Named counters for tracking events

use std::collections::BTreeMap;

#[derive(Default)]
pub struct Counters {
    values: BTreeMap<&'static str, u64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &'static str, value: u64) {
        *self.values.entry(name).or_insert(0) += value;
    }

    pub fn set(&mut self, name: &'static str, value: u64) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> u64 {
        self.values.get(name).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Counters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }
}
