use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::executor::aggregator::MetricsAggregator;
use crate::models::metrics::RequestSample;

/// The body every VU repeats: one request, producing one sample.
pub type IterationFn = Arc<dyn Fn() -> BoxFuture<'static, RequestSample> + Send + Sync>;

pub struct VirtualUser {
    pub id: u64,
    iteration: IterationFn,
    aggregator: Arc<MetricsAggregator>,
    sleep: Duration,
    stop: CancellationToken,
}

impl VirtualUser {
    pub fn new(
        id: u64,
        iteration: IterationFn,
        aggregator: Arc<MetricsAggregator>,
        sleep: Duration,
        stop: CancellationToken,
    ) -> Self {
        Self {
            id,
            iteration,
            aggregator,
            sleep,
            stop,
        }
    }

    /// Loops until `stop` fires. The in-flight request always completes and is
    /// recorded; only the think-time sleep is cut short. Returns the number of
    /// iterations run.
    pub async fn run(self) -> u64 {
        let mut iterations = 0;
        while !self.stop.is_cancelled() {
            let sample = (self.iteration)().await;
            self.aggregator.submit(sample);
            iterations += 1;

            if self.sleep.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = sleep(self.sleep) => {}
                _ = self.stop.cancelled() => break,
            }
        }
        tracing::debug!(vu = self.id, iterations, "virtual user stopped");
        iterations
    }
}
