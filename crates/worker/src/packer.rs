use std::io;
use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use courier_core::{
    push_until_shutdown, Channel, CourierError, CourierResult, FillStrategy, OverflowPolicy,
    Package, PackerConfig, PickupBox, PipelineMetrics, PopError, ShutdownListener,
};

use crate::strategies::{strategy_from_name, RandomFillStrategy};

/// 装箱器构建器
pub struct BoxPackerBuilder {
    id: usize,
    package_queue: Arc<dyn Channel<Package>>,
    box_queue: Arc<dyn Channel<PickupBox>>,
    strategy: Arc<dyn FillStrategy>,
    capacity: usize,
    extra_fraction: f64,
    overflow_policy: OverflowPolicy,
    poll_timeout: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl BoxPackerBuilder {
    pub fn new(
        id: usize,
        package_queue: Arc<dyn Channel<Package>>,
        box_queue: Arc<dyn Channel<PickupBox>>,
    ) -> Self {
        Self {
            id,
            package_queue,
            box_queue,
            strategy: Arc::new(RandomFillStrategy::new()),
            capacity: PickupBox::DEFAULT_CAPACITY,
            extra_fraction: 0.2,
            overflow_policy: OverflowPolicy::Requeue,
            poll_timeout: Duration::from_millis(100),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// 按配置文件设置容量、额外比例、溢出策略和装箱策略
    pub fn config(self, config: &PackerConfig) -> CourierResult<Self> {
        let strategy = strategy_from_name(&config.strategy)?;
        Ok(self
            .capacity(config.capacity)
            .extra_fraction(config.extra_fraction)
            .overflow_policy(config.overflow_policy)
            .strategy(strategy))
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn extra_fraction(mut self, extra_fraction: f64) -> Self {
        self.extra_fraction = extra_fraction;
        self
    }

    pub fn overflow_policy(mut self, overflow_policy: OverflowPolicy) -> Self {
        self.overflow_policy = overflow_policy;
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn FillStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> BoxPacker {
        let target = PackerConfig::pull_target(self.capacity, self.extra_fraction);

        BoxPacker {
            id: self.id,
            package_queue: self.package_queue,
            box_queue: self.box_queue,
            strategy: self.strategy,
            capacity: self.capacity,
            target,
            overflow_policy: self.overflow_policy,
            poll_timeout: self.poll_timeout,
            metrics: self.metrics,
            carry: Vec::new(),
        }
    }
}

/// 装箱器
///
/// 从包裹队列累积包裹，按装箱策略选出不超过容量的一箱推入箱子队列，
/// 多出的包裹按溢出策略处理。
pub struct BoxPacker {
    id: usize,
    package_queue: Arc<dyn Channel<Package>>,
    box_queue: Arc<dyn Channel<PickupBox>>,
    strategy: Arc<dyn FillStrategy>,
    capacity: usize,
    target: usize,
    overflow_policy: OverflowPolicy,
    poll_timeout: Duration,
    metrics: Arc<PipelineMetrics>,
    carry: Vec<Package>,
}

impl BoxPacker {
    pub fn builder(
        id: usize,
        package_queue: Arc<dyn Channel<Package>>,
        box_queue: Arc<dyn Channel<PickupBox>>,
    ) -> BoxPackerBuilder {
        BoxPackerBuilder::new(id, package_queue, box_queue)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// 每轮装箱前需要累积的包裹数
    pub fn target(&self) -> usize {
        self.target
    }

    /// 把缓冲区装成一箱，返回箱子和溢出的包裹
    pub fn pack(&self, buffer: Vec<Package>) -> CourierResult<(PickupBox, Vec<Package>)> {
        let plan = self.strategy.fill(buffer, self.capacity);
        let pickup_box = PickupBox::new(plan.selected, self.capacity)?;
        Ok((pickup_box, plan.overflow))
    }

    pub fn run(mut self, shutdown: ShutdownListener) -> CourierResult<()> {
        info!(
            "装箱器 {} 启动, 容量 {}, 每轮拉取 {}, 策略 {}",
            self.id,
            self.capacity,
            self.target,
            self.strategy.name()
        );

        let result = self.pack_until_shutdown(&shutdown);

        let carried = mem::take(&mut self.carry);
        if !carried.is_empty() {
            let count = carried.len();
            let requeued = self.requeue(carried, &shutdown);
            info!("装箱器 {} 退出时归还 {}/{} 个暂存包裹", self.id, requeued, count);
        }

        match &result {
            Ok(()) => info!("装箱器 {} 已停止", self.id),
            Err(e) => error!("装箱器 {} 异常退出: {}", self.id, e),
        }
        result
    }

    /// 在独立线程上运行
    pub fn spawn(self, shutdown: ShutdownListener) -> io::Result<JoinHandle<CourierResult<()>>> {
        thread::Builder::new()
            .name(format!("box-packer-{}", self.id))
            .spawn(move || self.run(shutdown))
    }

    fn pack_until_shutdown(&mut self, shutdown: &ShutdownListener) -> CourierResult<()> {
        loop {
            let mut buffer = mem::take(&mut self.carry);
            let stopping = self.fill_buffer(&mut buffer, shutdown)?;

            if !buffer.is_empty() {
                let (pickup_box, overflow) = self.pack(buffer)?;
                // 先发出箱子，溢出处理不能阻塞已经装好的箱子
                self.ship(pickup_box, shutdown);
                self.handle_overflow(overflow);
            }

            if stopping || shutdown.is_shutdown() {
                return Ok(());
            }
        }
    }

    /// 累积包裹直到达到目标数量，返回是否观察到关闭
    fn fill_buffer(
        &self,
        buffer: &mut Vec<Package>,
        shutdown: &ShutdownListener,
    ) -> CourierResult<bool> {
        while buffer.len() < self.target {
            if shutdown.is_shutdown() {
                return Ok(true);
            }

            match self.package_queue.pop(self.poll_timeout) {
                Ok(package) => buffer.push(package),
                Err(PopError::Empty) => continue,
                Err(PopError::Closed) => {
                    warn!("装箱器 {} 的包裹队列已关闭", self.id);
                    return Err(CourierError::queue_closed("packages"));
                }
            }
        }
        Ok(false)
    }

    fn handle_overflow(&mut self, overflow: Vec<Package>) {
        if overflow.is_empty() {
            return;
        }

        let count = overflow.len();
        match self.overflow_policy {
            OverflowPolicy::Requeue => {
                let requeued = self.requeue_overflow(overflow);
                self.metrics.record_overflow_requeued(requeued);
                debug!("装箱器 {} 归还 {}/{} 个溢出包裹", self.id, requeued, count);
            }
            OverflowPolicy::Drop => {
                self.metrics.record_overflow_dropped(count);
                debug!("装箱器 {} 丢弃 {} 个溢出包裹", self.id, count);
            }
            OverflowPolicy::Carry => {
                debug!("装箱器 {} 暂存 {} 个溢出包裹", self.id, count);
                self.carry.extend(overflow);
            }
        }
    }

    /// 尝试把溢出包裹放回包裹队列，放不下的留到下一轮装箱
    ///
    /// 装箱器是包裹队列唯一的消费者，这里不能无限等待队列腾出空间。
    fn requeue_overflow(&mut self, overflow: Vec<Package>) -> usize {
        let mut requeued = 0;
        let mut packages = overflow.into_iter();

        for package in packages.by_ref() {
            match self.package_queue.push(package, self.poll_timeout) {
                Ok(()) => requeued += 1,
                Err(e) => {
                    self.carry.push(e.into_inner());
                    break;
                }
            }
        }
        self.carry.extend(packages);

        if !self.carry.is_empty() {
            debug!(
                "装箱器 {} 的包裹队列已满, 暂存 {} 个溢出包裹",
                self.id,
                self.carry.len()
            );
        }
        requeued
    }

    /// 退出时把包裹放回包裹队列，返回成功入队的数量
    fn requeue(&self, packages: Vec<Package>, shutdown: &ShutdownListener) -> usize {
        let mut requeued = 0;
        for package in packages {
            let result = push_until_shutdown(
                self.package_queue.as_ref(),
                package,
                self.poll_timeout,
                shutdown,
            )
            .or_else(|package| self.package_queue.try_push(package).map_err(|e| e.into_inner()));

            match result {
                Ok(()) => requeued += 1,
                Err(package) => {
                    warn!("装箱器 {} 无法归还包裹 {}", self.id, package.id);
                    self.metrics.record_abandoned(1);
                }
            }
        }
        requeued
    }

    fn ship(&self, pickup_box: PickupBox, shutdown: &ShutdownListener) {
        let size = pickup_box.len();
        let result = push_until_shutdown(
            self.box_queue.as_ref(),
            pickup_box,
            self.poll_timeout,
            shutdown,
        )
        .or_else(|pickup_box| self.box_queue.try_push(pickup_box).map_err(|e| e.into_inner()));

        match result {
            Ok(()) => {
                self.metrics.record_box_packed();
                debug!("装箱器 {} 装出一箱, 共 {} 个包裹", self.id, size);
            }
            Err(pickup_box) => {
                warn!("装箱器 {} 关闭时箱子队列已满, 箱内包裹退回包裹队列", self.id);
                self.requeue(pickup_box.into_packages(), shutdown);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{Dimensions, FillPlan, PackingType};
    use courier_testing_utils::VecQueue;

    /// 故意装超过容量的策略
    struct GreedyStrategy;

    impl FillStrategy for GreedyStrategy {
        fn fill(&self, buffer: Vec<Package>, _capacity: usize) -> FillPlan {
            FillPlan {
                selected: buffer,
                overflow: Vec::new(),
            }
        }

        fn name(&self) -> &str {
            "greedy"
        }
    }

    fn packages(count: usize) -> Vec<Package> {
        (0..count)
            .map(|i| Package::new(Dimensions::new(1, 1, 1), i as f64, PackingType::Envelope))
            .collect()
    }

    fn packer(strategy: Arc<dyn FillStrategy>) -> BoxPacker {
        BoxPacker::builder(
            0,
            Arc::new(VecQueue::<Package>::default()),
            Arc::new(VecQueue::<PickupBox>::default()),
        )
        .capacity(4)
        .strategy(strategy)
        .build()
    }

    #[test]
    fn test_target_rounds_up() {
        let packer = BoxPacker::builder(
            0,
            Arc::new(VecQueue::<Package>::default()),
            Arc::new(VecQueue::<PickupBox>::default()),
        )
        .capacity(64)
        .extra_fraction(0.2)
        .build();

        assert_eq!(packer.target(), 77);
    }

    #[test]
    fn test_pack_splits_overflow() {
        let packer = packer(Arc::new(RandomFillStrategy::new()));

        let (pickup_box, overflow) = packer.pack(packages(6)).unwrap();
        assert_eq!(pickup_box.len(), 4);
        assert_eq!(pickup_box.capacity(), 4);
        assert_eq!(overflow.len(), 2);
    }

    #[test]
    fn test_pack_rejects_overfilled_box() {
        let packer = packer(Arc::new(GreedyStrategy));

        let err = packer.pack(packages(6)).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_overflow_is_carried_when_package_queue_is_full() {
        let package_queue = Arc::new(VecQueue::<Package>::bounded(2));
        package_queue.try_push(packages(1).remove(0)).unwrap();

        let mut packer = BoxPacker::builder(
            0,
            package_queue.clone(),
            Arc::new(VecQueue::<PickupBox>::new()),
        )
        .capacity(4)
        .build();

        let (_, overflow) = packer.pack(packages(7)).unwrap();
        packer.handle_overflow(overflow);

        // 队列只剩一个空位，其余溢出包裹留在装箱器里
        assert_eq!(package_queue.len(), 2);
        assert_eq!(packer.carry.len(), 2);
        assert_eq!(packer.metrics.counters().overflow_requeued, 1);
    }
}
