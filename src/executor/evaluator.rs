use std::time::Duration;

use crate::executor::aggregator::MetricsAggregator;
use crate::models::metrics::ThresholdResult;
use crate::models::threshold::{Metric, Stat, Threshold};

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Value a threshold is compared against. Durations are in milliseconds,
/// rates are ratios in 0..=1 except `http_reqs: rate`, which is per second.
pub fn observe(threshold: &Threshold, aggregator: &MetricsAggregator, elapsed: Duration) -> f64 {
    match (threshold.metric, threshold.stat) {
        (Metric::HttpReqDuration, Stat::Avg) => ms(aggregator.mean()),
        (Metric::HttpReqDuration, Stat::Min) => ms(aggregator.min()),
        (Metric::HttpReqDuration, Stat::Max) => ms(aggregator.max()),
        (Metric::HttpReqDuration, Stat::Med) => ms(aggregator.median()),
        (Metric::HttpReqDuration, Stat::Percentile(p)) => ms(aggregator.quantile(p / 100.0)),
        (Metric::Checks, _) => aggregator.success_ratio(),
        (Metric::HttpReqFailed, _) => {
            if aggregator.count() == 0 {
                0.0
            } else {
                1.0 - aggregator.success_ratio()
            }
        }
        (Metric::HttpReqs, Stat::Count) => aggregator.count() as f64,
        (Metric::HttpReqs, _) => {
            let secs = elapsed.as_secs_f64();
            if secs > 0.0 {
                aggregator.count() as f64 / secs
            } else {
                0.0
            }
        }
        // Parsing rejects every other pairing.
        (Metric::HttpReqDuration, Stat::Count | Stat::Rate) => f64::NAN,
    }
}

/// Post-run evaluation. Never stops a run; the caller decides the exit code.
pub fn evaluate(
    thresholds: &[Threshold],
    aggregator: &MetricsAggregator,
    elapsed: Duration,
) -> Vec<ThresholdResult> {
    thresholds
        .iter()
        .map(|threshold| {
            let observed = observe(threshold, aggregator, elapsed);
            let passed = threshold.comparator.holds(observed, threshold.value);
            if passed {
                tracing::debug!(threshold = %threshold.label(), observed, "threshold passed");
            } else {
                tracing::warn!(threshold = %threshold.label(), observed, "threshold crossed");
            }
            ThresholdResult {
                expression: threshold.label(),
                observed,
                passed,
            }
        })
        .collect()
}
