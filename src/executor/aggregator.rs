use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::models::metrics::{LatencyStats, Metrics, RequestSample};

/// Samples for `http_req_duration` plus outcome counts.
#[derive(Debug, Default)]
struct MetricSeries {
    latencies: Vec<Duration>,
    sorted: bool,
    successful: u64,
    status_counts: BTreeMap<String, u64>,
}

impl MetricSeries {
    fn sorted_latencies(&mut self) -> &[Duration] {
        if !self.sorted {
            self.latencies.sort_unstable();
            self.sorted = true;
        }
        &self.latencies
    }
}

/// Closest-rank linear interpolation over sorted samples.
fn interpolate(sorted: &[Duration], p: f64) -> Duration {
    match sorted.len() {
        0 => Duration::ZERO,
        1 => sorted[0],
        len => {
            let rank = p.clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = sorted[rank.floor() as usize];
            let upper = sorted[rank.ceil() as usize];
            let fraction = rank - rank.floor();
            let spread = (upper - lower).as_nanos() as f64;
            lower + Duration::from_nanos((spread * fraction).round() as u64)
        }
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Shared sink every VU submits into.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    series: Mutex<MetricSeries>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MetricSeries> {
        // A panicking VU cannot leave the series half-written: every update
        // below is a push or a counter bump.
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn submit(&self, sample: RequestSample) {
        let key = sample.status_key();
        let mut series = self.lock();
        series.latencies.push(sample.latency);
        series.sorted = false;
        if sample.is_success() {
            series.successful += 1;
        }
        *series.status_counts.entry(key).or_insert(0) += 1;
    }

    pub fn count(&self) -> u64 {
        self.lock().latencies.len() as u64
    }

    /// `p` is a fraction in `0.0..=1.0`. Zero when nothing was recorded.
    pub fn quantile(&self, p: f64) -> Duration {
        let mut series = self.lock();
        interpolate(series.sorted_latencies(), p)
    }

    /// Fraction of samples answered with status 200.
    pub fn success_ratio(&self) -> f64 {
        let series = self.lock();
        match series.latencies.len() {
            0 => 0.0,
            n => series.successful as f64 / n as f64,
        }
    }

    pub fn min(&self) -> Duration {
        self.lock().latencies.iter().min().copied().unwrap_or_default()
    }

    pub fn max(&self) -> Duration {
        self.lock().latencies.iter().max().copied().unwrap_or_default()
    }

    pub fn mean(&self) -> Duration {
        let series = self.lock();
        match series.latencies.len() {
            0 => Duration::ZERO,
            n => series.latencies.iter().sum::<Duration>() / n as u32,
        }
    }

    pub fn median(&self) -> Duration {
        self.quantile(0.5)
    }

    /// Point-in-time totals over a run that has lasted `elapsed`.
    pub fn summary(&self, elapsed: Duration) -> Metrics {
        let mut series = self.lock();
        let total = series.latencies.len() as u64;
        let successful = series.successful;
        let status_counts = series.status_counts.clone();

        let sorted = series.sorted_latencies();
        let latency_ms = if sorted.is_empty() {
            LatencyStats::default()
        } else {
            let sum: Duration = sorted.iter().sum();
            LatencyStats {
                min: as_ms(sorted[0]),
                avg: as_ms(sum) / sorted.len() as f64,
                med: as_ms(interpolate(sorted, 0.5)),
                p90: as_ms(interpolate(sorted, 0.90)),
                p95: as_ms(interpolate(sorted, 0.95)),
                p99: as_ms(interpolate(sorted, 0.99)),
                max: as_ms(sorted[sorted.len() - 1]),
            }
        };

        let secs = elapsed.as_secs_f64();
        Metrics {
            total_requests: total,
            successful_requests: successful,
            failed_requests: total - successful,
            success_ratio: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            throughput: if secs > 0.0 { total as f64 / secs } else { 0.0 },
            latency_ms,
            status_counts,
        }
    }
}
