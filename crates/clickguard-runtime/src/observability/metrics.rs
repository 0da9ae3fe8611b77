//! Metrics collection and reporting

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Monotonic counter
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: AtomicU64,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Upper bounds, in milliseconds, of the latency buckets
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
];

#[derive(Debug)]
struct HistogramState {
    /// One slot per bound plus the overflow slot
    buckets: Vec<u64>,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

/// Fixed-bucket histogram; memory does not grow with observations
#[derive(Debug)]
pub struct Histogram {
    name: String,
    bounds: Vec<f64>,
    state: Mutex<HistogramState>,
}

impl Histogram {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_buckets(name, DEFAULT_BUCKETS)
    }

    /// Bounds must be ascending
    pub fn with_buckets(name: impl Into<String>, bounds: &[f64]) -> Self {
        Self {
            name: name.into(),
            bounds: bounds.to_vec(),
            state: Mutex::new(HistogramState {
                buckets: vec![0; bounds.len() + 1],
                count: 0,
                sum: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HistogramState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn observe(&self, value: f64) {
        if value.is_nan() {
            return;
        }
        let slot = self.bounds.partition_point(|bound| *bound < value);
        let mut state = self.state();
        state.buckets[slot] += 1;
        state.count += 1;
        state.sum += value;
        state.min = state.min.min(value);
        state.max = state.max.max(value);
    }

    /// Observe a duration in milliseconds
    pub fn observe_duration(&self, duration: Duration) {
        self.observe(duration.as_secs_f64() * 1000.0);
    }

    pub fn count(&self) -> usize {
        self.state().count as usize
    }

    pub fn sum(&self) -> f64 {
        self.state().sum
    }

    pub fn avg(&self) -> f64 {
        let state = self.state();
        if state.count == 0 {
            0.0
        } else {
            state.sum / state.count as f64
        }
    }

    /// Estimated percentile (0-100): the upper bound of the bucket holding
    /// that rank, clamped to the observed range
    pub fn percentile(&self, p: f64) -> f64 {
        let state = self.state();
        if state.count == 0 {
            return 0.0;
        }

        let rank = ((p.clamp(0.0, 100.0) / 100.0) * state.count as f64).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (slot, hits) in state.buckets.iter().enumerate() {
            seen += hits;
            if seen >= rank {
                let bound = self.bounds.get(slot).copied().unwrap_or(state.max);
                return bound.clamp(state.min, state.max);
            }
        }
        state.max
    }

    /// Cumulative count per bound, Prometheus `le` style
    pub fn cumulative_buckets(&self) -> Vec<(f64, u64)> {
        let state = self.state();
        let mut seen = 0;
        self.bounds
            .iter()
            .zip(state.buckets.iter())
            .map(|(bound, hits)| {
                seen += hits;
                (*bound, seen)
            })
            .collect()
    }

    pub fn reset(&self) {
        let mut state = self.state();
        state.buckets.iter_mut().for_each(|slot| *slot = 0);
        state.count = 0;
        state.sum = 0.0;
        state.min = f64::INFINITY;
        state.max = f64::NEG_INFINITY;
    }
}

/// Named registry of counters and histograms
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: RwLock<BTreeMap<String, Arc<Counter>>>,
    histograms: RwLock<BTreeMap<String, Arc<Histogram>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a counter
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        if let Some(counter) = self
            .counters
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
        {
            return counter.clone();
        }
        self.counters
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Counter::new(name)))
            .clone()
    }

    /// Get or create a histogram
    pub fn histogram(&self, name: &str) -> Arc<Histogram> {
        if let Some(histogram) = self
            .histograms
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
        {
            return histogram.clone();
        }
        self.histograms
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::new(name)))
            .clone()
    }

    pub fn record_duration(&self, operation: &str, duration: Duration) {
        self.histogram(&format!("{}_duration_ms", operation))
            .observe_duration(duration);
    }

    pub fn record_error(&self, error_type: &str) {
        self.counter(&format!("errors_{}", error_type)).inc();
    }

    pub fn counter_names(&self) -> Vec<String> {
        self.counters
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn reset_all(&self) {
        for counter in self.counters.read().unwrap_or_else(|p| p.into_inner()).values() {
            counter.reset();
        }
        for histogram in self
            .histograms
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
        {
            histogram.reset();
        }
    }

    /// Plain-text exposition, one `name value` line per series
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, counter) in self.counters.read().unwrap_or_else(|p| p.into_inner()).iter() {
            let _ = writeln!(out, "{} {}", name, counter.get());
        }
        for (name, histogram) in self
            .histograms
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
        {
            for (bound, hits) in histogram.cumulative_buckets() {
                let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", name, bound, hits);
            }
            let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, histogram.count());
            let _ = writeln!(out, "{}_count {}", name, histogram.count());
            let _ = writeln!(out, "{}_sum {:.3}", name, histogram.sum());
            let _ = writeln!(out, "{}_p99 {:.3}", name, histogram.percentile(99.0));
        }
        out
    }
}
