// telemetry.rs - Fire-and-forget counters and timing statistics.
//
// Owned by the processor instance rather than held in process-wide statics,
// so one host can run several processors without their numbers bleeding into
// each other. Recording never blocks and never surfaces an error to the
// caller; a telemetry sink that can throw into the scheduler is worse than
// no telemetry at all.

use std::time::Duration;

use dashmap::DashMap;

/// Metric names used by the scheduler itself. Hosts may record their own
/// series under their own names alongside these.
pub mod metric {
    pub const ENQUEUES: &str = "enqueues";
    pub const QUEUE_MERGES: &str = "queue_merges";
    pub const ITEMS_PROCESSED: &str = "items_processed";
    pub const ITEMS_CANCELED: &str = "items_canceled";
    pub const ITEM_FAILURES: &str = "item_failures";
    pub const ITEM_DURATION_MS: &str = "item_duration_ms";
}

/// Key for one telemetry series: a static name, optionally scoped by an id
/// (a tier index, a project id, or anything else the recorder chooses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    Name(&'static str),
    Tagged(&'static str, u64),
}

/// Min/max/mean statistics over recorded samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleStats {
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
}

impl SampleStats {
    fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

const HISTOGRAM_BUCKETS: usize = 16;

/// Power-of-two bucketed histogram: bucket `i` counts values in
/// `[2^(i-1), 2^i)`, with bucket 0 holding zeros and the last bucket
/// absorbing everything larger.
#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: [u64; HISTOGRAM_BUCKETS],
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            buckets: [0; HISTOGRAM_BUCKETS],
        }
    }
}

impl Histogram {
    fn record(&mut self, value: u64) {
        let index = (64 - value.leading_zeros() as usize).min(HISTOGRAM_BUCKETS - 1);
        self.buckets[index] += 1;
    }

    pub fn bucket(&self, index: usize) -> u64 {
        self.buckets[index]
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }
}

/// Telemetry state for one processor instance.
#[derive(Debug, Default)]
pub struct AnalysisTelemetry {
    counters: DashMap<MetricKey, u64>,
    samples: DashMap<MetricKey, SampleStats>,
    histograms: DashMap<MetricKey, Histogram>,
}

impl AnalysisTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, key: MetricKey) {
        self.add(key, 1);
    }

    pub fn add(&self, key: MetricKey, delta: u64) {
        *self.counters.entry(key).or_insert(0) += delta;
    }

    /// Records a raw sample into both the min/max/mean statistics and the
    /// bucketed histogram for `key`.
    pub fn record_sample(&self, key: MetricKey, value: u64) {
        self.samples.entry(key).or_default().record(value);
        self.histograms.entry(key).or_default().record(value);
    }

    pub fn record_duration(&self, key: MetricKey, duration: Duration) {
        self.record_sample(key, duration.as_millis() as u64);
    }

    pub fn counter(&self, key: MetricKey) -> u64 {
        self.counters.get(&key).map(|v| *v).unwrap_or(0)
    }

    pub fn sample(&self, key: MetricKey) -> Option<SampleStats> {
        self.samples.get(&key).map(|s| *s)
    }

    pub fn histogram(&self, key: MetricKey) -> Option<Histogram> {
        self.histograms.get(&key).map(|h| h.clone())
    }

    /// Logs a one-line summary per counter and sample series.
    pub fn log_summary(&self) {
        for entry in self.counters.iter() {
            log::info!("[telemetry] {:?}: {}", entry.key(), entry.value());
        }
        for entry in self.samples.iter() {
            let s = entry.value();
            log::info!(
                "[telemetry] {:?}: n={} min={} max={} mean={:.1}",
                entry.key(),
                s.count(),
                s.min(),
                s.max(),
                s.mean()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let telemetry = AnalysisTelemetry::new();
        let key = MetricKey::Name(metric::ENQUEUES);
        telemetry.increment(key);
        telemetry.add(key, 4);
        assert_eq!(telemetry.counter(key), 5);
        assert_eq!(telemetry.counter(MetricKey::Name("missing")), 0);
    }

    #[test]
    fn test_tagged_keys_are_independent() {
        let telemetry = AnalysisTelemetry::new();
        telemetry.increment(MetricKey::Tagged(metric::ITEMS_PROCESSED, 0));
        telemetry.increment(MetricKey::Tagged(metric::ITEMS_PROCESSED, 1));
        telemetry.increment(MetricKey::Tagged(metric::ITEMS_PROCESSED, 1));
        assert_eq!(
            telemetry.counter(MetricKey::Tagged(metric::ITEMS_PROCESSED, 0)),
            1
        );
        assert_eq!(
            telemetry.counter(MetricKey::Tagged(metric::ITEMS_PROCESSED, 1)),
            2
        );
    }

    #[test]
    fn test_sample_stats() {
        let telemetry = AnalysisTelemetry::new();
        let key = MetricKey::Name(metric::ITEM_DURATION_MS);
        telemetry.record_sample(key, 10);
        telemetry.record_sample(key, 30);
        telemetry.record_sample(key, 20);

        let stats = telemetry.sample(key).unwrap();
        assert_eq!(stats.count(), 3);
        assert_eq!(stats.min(), 10);
        assert_eq!(stats.max(), 30);
        assert!((stats.mean() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_histogram_buckets() {
        let mut histogram = Histogram::default();
        histogram.record(0); // bucket 0
        histogram.record(1); // bucket 1
        histogram.record(2); // bucket 2
        histogram.record(3); // bucket 2
        histogram.record(1024); // bucket 11
        histogram.record(u64::MAX); // clamped to the last bucket

        assert_eq!(histogram.bucket(0), 1);
        assert_eq!(histogram.bucket(1), 1);
        assert_eq!(histogram.bucket(2), 2);
        assert_eq!(histogram.bucket(11), 1);
        assert_eq!(histogram.bucket(HISTOGRAM_BUCKETS - 1), 1);
        assert_eq!(histogram.total(), 6);
    }

    #[test]
    fn test_empty_stats_mean_is_zero() {
        assert_eq!(SampleStats::default().mean(), 0.0);
    }
}
