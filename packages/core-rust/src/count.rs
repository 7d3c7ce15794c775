//! Performance counters collaborator.
//!
//! The default implementation forwards to the `metrics` facade, so any
//! installed recorder (e.g. the Prometheus exporter) picks the values up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sink for call counts and timings.
pub trait Counters: Send + Sync {
    /// Adds `value` to the counter `name`.
    fn increment(&self, name: &str, value: u64);

    fn increment_one(&self, name: &str) {
        self.increment(name, 1);
    }

    /// Records one elapsed interval for the timer `name`.
    fn record_duration(&self, name: &str, elapsed: Duration);
}

/// Running timer that records its elapsed time when ended.
#[must_use = "dropping a timing without ending it records nothing"]
pub struct CounterTiming {
    counters: Arc<dyn Counters>,
    name: String,
    start: Instant,
}

impl CounterTiming {
    pub fn start(counters: Arc<dyn Counters>, name: impl Into<String>) -> Self {
        Self {
            counters,
            name: name.into(),
            start: Instant::now(),
        }
    }

    /// Stops the timer and returns the recorded interval.
    pub fn end_timing(self) -> Duration {
        let elapsed = self.start.elapsed();
        self.counters.record_duration(&self.name, elapsed);
        elapsed
    }
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

/// Forwards to `metrics::counter!` and `metrics::histogram!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCounters;

impl Counters for MetricsCounters {
    fn increment(&self, name: &str, value: u64) {
        metrics::counter!(name.to_string()).increment(value);
    }

    fn record_duration(&self, name: &str, elapsed: Duration) {
        metrics::histogram!(name.to_string()).record(elapsed.as_secs_f64() * 1000.0);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCounters;

impl Counters for NullCounters {
    fn increment(&self, _name: &str, _value: u64) {}

    fn record_duration(&self, _name: &str, _elapsed: Duration) {}
}

/// Keeps counts and timing samples in memory. Handy for assertions.
#[derive(Debug, Default)]
pub struct MemoryCounters {
    counts: DashMap<String, u64>,
    timings: DashMap<String, Vec<Duration>>,
}

impl MemoryCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).map_or(0, |v| *v)
    }

    /// Number of intervals recorded for the timer `name`.
    #[must_use]
    pub fn timing_samples(&self, name: &str) -> usize {
        self.timings.get(name).map_or(0, |v| v.len())
    }
}

impl Counters for MemoryCounters {
    fn increment(&self, name: &str, value: u64) {
        *self.counts.entry(name.to_string()).or_insert(0) += value;
    }

    fn record_duration(&self, name: &str, elapsed: Duration) {
        self.timings.entry(name.to_string()).or_default().push(elapsed);
    }
}
