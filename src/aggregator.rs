use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use courier_core::{Channel, CourierResult, Package, PipelineMetrics, PopError, ShutdownListener};
use tracing::{debug, info};

/// 结果汇总器
///
/// 持续清空成功队列和失败队列并计数，按固定间隔输出汇总日志。
pub struct ResultAggregator {
    successful: Arc<dyn Channel<Package>>,
    failed: Arc<dyn Channel<Package>>,
    poll_timeout: Duration,
    report_interval: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl ResultAggregator {
    pub fn new(
        successful: Arc<dyn Channel<Package>>,
        failed: Arc<dyn Channel<Package>>,
        poll_timeout: Duration,
        report_interval: Duration,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            successful,
            failed,
            poll_timeout,
            report_interval,
            metrics,
        }
    }

    /// 运行直到 `drain` 触发，然后清空两个队列中剩余的包裹
    pub fn run(self, drain: ShutdownListener) -> CourierResult<()> {
        info!("结果汇总器启动");
        let slice = (self.poll_timeout / 2).max(Duration::from_millis(1));
        let mut last_report = Instant::now();

        while !drain.is_shutdown() {
            if self.successful.pop(slice).is_ok() {
                self.metrics.record_aggregated_success();
            }

            match self.failed.pop(slice) {
                Ok(_) => self.metrics.record_aggregated_failure(),
                Err(PopError::Empty) | Err(PopError::Closed) => {}
            }

            if last_report.elapsed() >= self.report_interval {
                self.log_summary();
                last_report = Instant::now();
            }
        }

        let remaining = self.drain_available();
        debug!("汇总器退出前清空 {} 个结果", remaining);
        self.log_summary();
        info!("结果汇总器已停止");
        Ok(())
    }

    /// 在独立线程上运行
    pub fn spawn(self, drain: ShutdownListener) -> io::Result<JoinHandle<CourierResult<()>>> {
        thread::Builder::new()
            .name("result-aggregator".to_string())
            .spawn(move || self.run(drain))
    }

    /// 不阻塞地取出队列中现有的全部结果
    pub fn drain_available(&self) -> usize {
        let mut count = 0;
        while self.successful.try_pop().is_ok() {
            self.metrics.record_aggregated_success();
            count += 1;
        }
        while self.failed.try_pop().is_ok() {
            self.metrics.record_aggregated_failure();
            count += 1;
        }
        count
    }

    fn log_summary(&self) {
        let counters = self.metrics.counters();
        info!(
            successes = counters.aggregated_successes,
            failures = counters.aggregated_failures,
            "投递结果汇总"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{Dimensions, PackingType, ShutdownSignal};
    use courier_infrastructure::BlockingQueue;

    fn package() -> Package {
        Package::new(Dimensions::new(1, 2, 3), 4.0, PackingType::Roll)
    }

    #[test]
    fn test_drain_available_counts_both_sinks() {
        let successful = Arc::new(BlockingQueue::unbounded("successful"));
        let failed = Arc::new(BlockingQueue::unbounded("failed"));
        let metrics = Arc::new(PipelineMetrics::new());

        for _ in 0..3 {
            successful.try_push(package()).unwrap();
        }
        failed.try_push(package()).unwrap();

        let aggregator = ResultAggregator::new(
            successful.clone(),
            failed.clone(),
            Duration::from_millis(10),
            Duration::from_secs(1),
            metrics.clone(),
        );

        assert_eq!(aggregator.drain_available(), 4);
        assert!(successful.is_empty());
        assert!(failed.is_empty());

        let counters = metrics.counters();
        assert_eq!(counters.aggregated_successes, 3);
        assert_eq!(counters.aggregated_failures, 1);
    }

    #[test]
    fn test_run_counts_results_pushed_before_drain() {
        let successful = Arc::new(BlockingQueue::unbounded("successful"));
        let failed = Arc::new(BlockingQueue::unbounded("failed"));
        let metrics = Arc::new(PipelineMetrics::new());
        let drain = ShutdownSignal::new();

        let handle = ResultAggregator::new(
            successful.clone(),
            failed.clone(),
            Duration::from_millis(10),
            Duration::from_millis(5),
            metrics.clone(),
        )
        .spawn(drain.listener())
        .unwrap();

        for _ in 0..5 {
            successful.try_push(package()).unwrap();
            failed.try_push(package()).unwrap();
        }
        drain.shutdown();
        handle.join().unwrap().unwrap();

        let counters = metrics.counters();
        assert_eq!(counters.aggregated_successes, 5);
        assert_eq!(counters.aggregated_failures, 5);
    }
}
