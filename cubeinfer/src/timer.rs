use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Accumulates wall time per operator type over a forward pass.
#[derive(Debug, Default)]
pub struct Timer {
    starts: BTreeMap<String, Instant>,
    durations: BTreeMap<String, Duration>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, key: &str) {
        self.starts.insert(key.to_string(), Instant::now());
    }

    /// Stop the clock for `key` and add the lap to its total.
    pub fn stop(&mut self, key: &str) {
        let elapsed = self
            .starts
            .remove(key)
            .map(|start| start.elapsed())
            .unwrap_or_default();
        *self.durations.entry(key.to_string()).or_default() += elapsed;
    }

    pub fn elapsed(&self, key: &str) -> Option<Duration> {
        self.durations.get(key).copied()
    }

    pub fn total(&self) -> Duration {
        self.durations.values().sum()
    }

    /// Totals ordered by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.durations
            .iter()
            .map(|(key, duration)| (key.as_str(), *duration))
    }
}
