use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 流水线运行计数器
///
/// 各组件只做累加，读取方通过 [`PipelineMetrics::counters`] 获取快照。
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    packages_produced: AtomicU64,
    boxes_packed: AtomicU64,
    overflow_requeued: AtomicU64,
    overflow_dropped: AtomicU64,
    boxes_delivered: AtomicU64,
    packages_delivered: AtomicU64,
    packages_incorrect: AtomicU64,
    packages_redelivered: AtomicU64,
    packages_abandoned: AtomicU64,
    aggregated_successes: AtomicU64,
    aggregated_failures: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_produced(&self) {
        self.packages_produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_box_packed(&self) {
        self.boxes_packed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow_requeued(&self, count: usize) {
        self.overflow_requeued.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_overflow_dropped(&self, count: usize) {
        self.overflow_dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// 记录一个箱子的投递结果
    pub fn record_outcome(&self, delivered: usize, incorrect: usize, redelivery: usize) {
        self.boxes_delivered.fetch_add(1, Ordering::Relaxed);
        self.packages_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.packages_incorrect
            .fetch_add(incorrect as u64, Ordering::Relaxed);
        self.packages_redelivered
            .fetch_add(redelivery as u64, Ordering::Relaxed);
    }

    /// 记录关闭时从在途箱子回收的已分类包裹，不计入已投递箱数
    pub fn record_partial_outcome(&self, delivered: usize, incorrect: usize) {
        self.packages_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.packages_incorrect
            .fetch_add(incorrect as u64, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self, count: usize) {
        self.packages_abandoned
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_aggregated_success(&self) {
        self.aggregated_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aggregated_failure(&self) {
        self.aggregated_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counters(&self) -> PipelineCounters {
        PipelineCounters {
            packages_produced: self.packages_produced.load(Ordering::Relaxed),
            boxes_packed: self.boxes_packed.load(Ordering::Relaxed),
            overflow_requeued: self.overflow_requeued.load(Ordering::Relaxed),
            overflow_dropped: self.overflow_dropped.load(Ordering::Relaxed),
            boxes_delivered: self.boxes_delivered.load(Ordering::Relaxed),
            packages_delivered: self.packages_delivered.load(Ordering::Relaxed),
            packages_incorrect: self.packages_incorrect.load(Ordering::Relaxed),
            packages_redelivered: self.packages_redelivered.load(Ordering::Relaxed),
            packages_abandoned: self.packages_abandoned.load(Ordering::Relaxed),
            aggregated_successes: self.aggregated_successes.load(Ordering::Relaxed),
            aggregated_failures: self.aggregated_failures.load(Ordering::Relaxed),
        }
    }
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCounters {
    pub packages_produced: u64,
    pub boxes_packed: u64,
    pub overflow_requeued: u64,
    pub overflow_dropped: u64,
    pub boxes_delivered: u64,
    pub packages_delivered: u64,
    pub packages_incorrect: u64,
    pub packages_redelivered: u64,
    pub packages_abandoned: u64,
    pub aggregated_successes: u64,
    pub aggregated_failures: u64,
}

/// 各队列深度（近似值）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepths {
    pub packages: usize,
    pub boxes: usize,
    pub successful: usize,
    pub failed: usize,
}

/// 对外暴露的只读观测快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub taken_at: DateTime<Utc>,
    pub queues: QueueDepths,
    pub counters: PipelineCounters,
}

impl PipelineSnapshot {
    pub fn new(queues: QueueDepths, counters: PipelineCounters) -> Self {
        Self {
            taken_at: Utc::now(),
            queues,
            counters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = PipelineMetrics::new();

        metrics.record_produced();
        metrics.record_produced();
        metrics.record_box_packed();
        metrics.record_outcome(3, 1, 2);
        metrics.record_outcome(1, 0, 0);
        metrics.record_overflow_dropped(4);

        let counters = metrics.counters();
        assert_eq!(counters.packages_produced, 2);
        assert_eq!(counters.boxes_packed, 1);
        assert_eq!(counters.boxes_delivered, 2);
        assert_eq!(counters.packages_delivered, 4);
        assert_eq!(counters.packages_incorrect, 1);
        assert_eq!(counters.packages_redelivered, 2);
        assert_eq!(counters.overflow_dropped, 4);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = PipelineSnapshot::new(
            QueueDepths {
                packages: 5,
                ..Default::default()
            },
            PipelineCounters::default(),
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["queues"]["packages"], 5);
        assert_eq!(json["counters"]["boxes_packed"], 0);
    }
}
