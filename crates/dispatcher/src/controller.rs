use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError, Sender, UnboundedReceiver};
use tokio::task::JoinHandle as TaskHandle;
use tracing::{debug, error, info, warn};

use courier_core::{
    AbandonPolicy, Channel, CourierError, CourierResult, DeliveryOutcome, DispatcherConfig,
    DrawSource, FleetConfig, Package, PickupBox, PipelineMetrics, PopError, PushError,
    RandomDraws, ShutdownListener,
};

use crate::car::{DeliveryCar, InFlightLedger, SharedBoxReceiver};
use crate::delivery::DeliveryOdds;

/// 为每辆车创建随机数来源
pub type DrawFactory = Arc<dyn Fn(usize) -> Box<dyn DrawSource> + Send + Sync>;

/// 调度器连接的跨线程队列
#[derive(Clone)]
pub struct DispatcherQueues {
    pub boxes: Arc<dyn Channel<PickupBox>>,
    pub packages: Arc<dyn Channel<Package>>,
    pub successful: Arc<dyn Channel<Package>>,
    pub failed: Arc<dyn Channel<Package>>,
}

/// 调度器退出时的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub boxes_dispatched: u64,
    pub outcomes_routed: u64,
    /// 关闭时放回包裹队列的包裹数
    pub requeued_on_shutdown: u64,
    pub abandoned: u64,
    pub panicked_cars: usize,
}

/// 车队调度器
///
/// 把箱子队列里的箱子交给车队，再把车队的投递结果分发到成功队列、
/// 失败队列和包裹队列。调度器和车队运行在同一个单线程运行时上。
pub struct CarDispatcher {
    queues: DispatcherQueues,
    fleet: FleetConfig,
    odds: DeliveryOdds,
    poll_interval: Duration,
    poll_timeout: Duration,
    abandon_policy: AbandonPolicy,
    metrics: Arc<PipelineMetrics>,
    draws: DrawFactory,
}

struct Fleet {
    cars: Vec<(usize, TaskHandle<()>, InFlightLedger)>,
    box_tx: Sender<PickupBox>,
    box_rx: SharedBoxReceiver,
    results: UnboundedReceiver<DeliveryOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Successful,
    Failed,
    Packages,
}

impl Sink {
    const ALL: [Sink; 3] = [Sink::Successful, Sink::Failed, Sink::Packages];
}

/// 暂时推不进下游队列的包裹，按目标队列分别保持先后顺序
#[derive(Debug, Default)]
struct Backlog {
    successful: VecDeque<Package>,
    failed: VecDeque<Package>,
    packages: VecDeque<Package>,
}

impl Backlog {
    fn lane(&mut self, sink: Sink) -> &mut VecDeque<Package> {
        match sink {
            Sink::Successful => &mut self.successful,
            Sink::Failed => &mut self.failed,
            Sink::Packages => &mut self.packages,
        }
    }

    fn len(&self) -> usize {
        self.successful.len() + self.failed.len() + self.packages.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CarDispatcher {
    pub fn new(
        queues: DispatcherQueues,
        fleet: &FleetConfig,
        config: &DispatcherConfig,
        poll_timeout: Duration,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let seed = fleet.seed;
        let draws: DrawFactory = Arc::new(move |id: usize| -> Box<dyn DrawSource> {
            match seed {
                Some(seed) => Box::new(RandomDraws::seeded(seed.wrapping_add(id as u64))),
                None => Box::new(RandomDraws::from_entropy()),
            }
        });

        Self {
            queues,
            fleet: fleet.clone(),
            odds: DeliveryOdds::from_config(fleet),
            poll_interval: config.poll_interval(),
            poll_timeout,
            abandon_policy: config.abandon_policy,
            metrics,
            draws,
        }
    }

    /// 替换车辆的随机数来源
    pub fn with_draws(mut self, draws: DrawFactory) -> Self {
        self.draws = draws;
        self
    }

    /// 在独立线程上创建单线程运行时并运行调度循环
    pub fn spawn(
        self,
        shutdown: ShutdownListener,
    ) -> io::Result<JoinHandle<CourierResult<DispatchReport>>> {
        thread::Builder::new()
            .name("car-dispatcher".to_string())
            .spawn(move || self.run(shutdown))
    }

    pub fn run(self, shutdown: ShutdownListener) -> CourierResult<DispatchReport> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| CourierError::Runtime(format!("创建调度器运行时失败: {e}")))?;

        runtime.block_on(self.run_until_shutdown(shutdown))
    }

    /// 调度循环，必须运行在单线程运行时上
    pub async fn run_until_shutdown(
        self,
        shutdown: ShutdownListener,
    ) -> CourierResult<DispatchReport> {
        let mut report = DispatchReport::default();
        let mut fleet = self.launch_fleet();
        let mut pending: Option<PickupBox> = None;
        let mut backlog = Backlog::default();

        info!(
            "调度器启动: {} 辆车, 车队队列容量 {}",
            fleet.cars.len(),
            self.fleet.internal_queue_capacity
        );

        while !shutdown.is_shutdown() {
            self.retry_backlog(&mut backlog);

            if pending.is_none() {
                pending = match self.queues.boxes.try_pop() {
                    Ok(pickup_box) => Some(pickup_box),
                    Err(PopError::Empty) => None,
                    Err(PopError::Closed) => {
                        warn!("箱子队列已关闭, 调度器停止接收箱子");
                        break;
                    }
                };
            }

            if let Some(pickup_box) = pending.take() {
                match tokio::time::timeout(self.poll_timeout, fleet.box_tx.reserve()).await {
                    Ok(Ok(permit)) => {
                        permit.send(pickup_box);
                        report.boxes_dispatched += 1;
                    }
                    Ok(Err(_)) | Err(_) => {
                        debug!("车队队列已满, 箱子留待下一轮");
                        pending = Some(pickup_box);
                    }
                }
            }

            match fleet.results.try_recv() {
                Ok(outcome) => {
                    self.route(outcome, &mut backlog).await;
                    report.outcomes_routed += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.notified() => {}
            }
        }

        self.shutdown_fleet(fleet, pending, backlog, &mut report).await;

        info!(
            "调度器已停止: 派出 {} 箱, 处理结果 {} 份, 关闭时归还 {} 个包裹, 丢弃 {} 个",
            report.boxes_dispatched,
            report.outcomes_routed,
            report.requeued_on_shutdown,
            report.abandoned
        );
        Ok(report)
    }

    fn launch_fleet(&self) -> Fleet {
        let (box_tx, box_rx) = mpsc::channel(self.fleet.internal_queue_capacity.max(1));
        let box_rx: SharedBoxReceiver = Arc::new(tokio::sync::Mutex::new(box_rx));
        let (result_tx, results) = mpsc::unbounded_channel();

        let workers = self.fleet.workers.max(0) as usize;
        let cars = (0..workers)
            .map(|id| {
                let car = DeliveryCar::new(
                    id,
                    self.odds,
                    self.fleet.transit_delay(),
                    (self.draws)(id),
                );
                let ledger = car.ledger();
                let handle = tokio::spawn(car.run(Arc::clone(&box_rx), result_tx.clone()));
                (id, handle, ledger)
            })
            .collect();

        Fleet {
            cars,
            box_tx,
            box_rx,
            results,
        }
    }

    fn queue(&self, sink: Sink) -> &Arc<dyn Channel<Package>> {
        match sink {
            Sink::Successful => &self.queues.successful,
            Sink::Failed => &self.queues.failed,
            Sink::Packages => &self.queues.packages,
        }
    }

    /// 分发一份投递结果，不检查包裹内容
    ///
    /// 下游队列已满时包裹进入积压，由后续轮次重试，调度循环不会在这里等待。
    async fn route(&self, outcome: DeliveryOutcome, backlog: &mut Backlog) {
        self.metrics.record_outcome(
            outcome.delivered.len(),
            outcome.incorrect.len(),
            outcome.redelivery.len(),
        );

        for package in outcome.delivered {
            self.offer(Sink::Successful, package, backlog);
        }
        tokio::task::yield_now().await;

        for package in outcome.incorrect {
            self.offer(Sink::Failed, package, backlog);
        }
        tokio::task::yield_now().await;

        for package in outcome.redelivery {
            self.offer(Sink::Packages, package, backlog);
        }
    }

    /// 非阻塞推送，同一队列已有积压时直接排在积压后面
    fn offer(&self, sink: Sink, package: Package, backlog: &mut Backlog) {
        let lane = backlog.lane(sink);
        if !lane.is_empty() {
            lane.push_back(package);
            return;
        }

        match self.queue(sink).try_push(package) {
            Ok(()) => {}
            Err(PushError::Full(package)) => {
                debug!("{:?} 队列已满, 包裹 {} 进入积压", sink, package.id);
                lane.push_back(package);
            }
            Err(PushError::Closed(package)) => {
                warn!("队列已关闭, 丢弃包裹 {}", package.id);
                self.metrics.record_abandoned(1);
            }
        }
    }

    /// 按先后顺序重试积压的包裹，遇到已满的队列就停在那里
    fn retry_backlog(&self, backlog: &mut Backlog) {
        for sink in Sink::ALL {
            let queue = self.queue(sink);
            let lane = backlog.lane(sink);

            while let Some(package) = lane.pop_front() {
                match queue.try_push(package) {
                    Ok(()) => {}
                    Err(PushError::Full(package)) => {
                        lane.push_front(package);
                        break;
                    }
                    Err(PushError::Closed(package)) => {
                        warn!("队列已关闭, 丢弃包裹 {}", package.id);
                        self.metrics.record_abandoned(1);
                    }
                }
            }
        }
    }

    /// 关闭流程中的推送：队列满时最多等待一次，之后对该队列只做非阻塞尝试
    fn settle(&self, sink: Sink, package: Package, saturated: &mut [bool; 3]) -> bool {
        let queue = self.queue(sink);
        let slot = &mut saturated[sink as usize];

        let result = match queue.try_push(package) {
            Err(PushError::Full(package)) if !*slot => queue.push(package, self.poll_timeout),
            other => other,
        };

        match result {
            Ok(()) => true,
            Err(PushError::Full(package)) => {
                *slot = true;
                warn!("关闭时队列已满, 丢弃包裹 {}", package.id);
                self.metrics.record_abandoned(1);
                false
            }
            Err(PushError::Closed(package)) => {
                warn!("队列已关闭, 丢弃包裹 {}", package.id);
                self.metrics.record_abandoned(1);
                false
            }
        }
    }

    async fn shutdown_fleet(
        &self,
        fleet: Fleet,
        pending: Option<PickupBox>,
        mut backlog: Backlog,
        report: &mut DispatchReport,
    ) {
        let Fleet {
            cars,
            box_tx,
            box_rx,
            mut results,
        } = fleet;

        info!("调度器收到关闭信号, 中止 {} 辆投递车", cars.len());
        drop(box_tx);
        for (_, handle, _) in &cars {
            handle.abort();
        }

        let mut ledgers = Vec::with_capacity(cars.len());
        for (id, handle, ledger) in cars {
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => debug!("投递车 {} 已取消", id),
                Err(e) => {
                    error!("投递车 {} 异常退出: {}", id, e);
                    report.panicked_cars += 1;
                }
            }
            ledgers.push(ledger);
        }

        let mut saturated = [false; 3];

        // 积压和已完成的结果都是正常投递结果，重新投递部分不受放弃策略影响
        if !backlog.is_empty() {
            debug!("关闭时清理 {} 个积压包裹", backlog.len());
        }
        for sink in Sink::ALL {
            for package in std::mem::take(backlog.lane(sink)) {
                self.settle_counted(sink, package, &mut saturated, report);
            }
        }

        while let Ok(outcome) = results.try_recv() {
            self.metrics.record_outcome(
                outcome.delivered.len(),
                outcome.incorrect.len(),
                outcome.redelivery.len(),
            );
            let routes = [
                (Sink::Successful, outcome.delivered),
                (Sink::Failed, outcome.incorrect),
                (Sink::Packages, outcome.redelivery),
            ];
            for (sink, packages) in routes {
                for package in packages {
                    self.settle_counted(sink, package, &mut saturated, report);
                }
            }
            report.outcomes_routed += 1;
        }

        for ledger in ledgers {
            if let Some(in_flight) = ledger.take() {
                debug!(
                    "回收在途箱子: 已投递 {}, 未投递 {}",
                    in_flight.outcome.total(),
                    in_flight.remaining.len()
                );
                let outcome = in_flight.into_outcome();
                self.metrics
                    .record_partial_outcome(outcome.delivered.len(), outcome.incorrect.len());
                self.abandon(outcome, &mut saturated, report);
            }
        }

        let mut unclaimed = Vec::new();
        {
            let mut receiver = box_rx.lock().await;
            while let Ok(pickup_box) = receiver.try_recv() {
                unclaimed.push(pickup_box);
            }
        }
        unclaimed.extend(pending);

        for pickup_box in unclaimed {
            let outcome = DeliveryOutcome {
                redelivery: pickup_box.into_packages(),
                ..DeliveryOutcome::default()
            };
            self.abandon(outcome, &mut saturated, report);
        }
    }

    fn settle_counted(
        &self,
        sink: Sink,
        package: Package,
        saturated: &mut [bool; 3],
        report: &mut DispatchReport,
    ) {
        let settled = self.settle(sink, package, saturated);
        match (settled, sink) {
            (true, Sink::Packages) => report.requeued_on_shutdown += 1,
            (true, _) => {}
            (false, _) => report.abandoned += 1,
        }
    }

    /// 按放弃策略处理未完成的包裹
    ///
    /// 已经投递和地址错误的包裹总是进入对应队列，只有重新投递部分受策略影响。
    fn abandon(
        &self,
        outcome: DeliveryOutcome,
        saturated: &mut [bool; 3],
        report: &mut DispatchReport,
    ) {
        for package in outcome.delivered {
            self.settle_counted(Sink::Successful, package, saturated, report);
        }
        for package in outcome.incorrect {
            self.settle_counted(Sink::Failed, package, saturated, report);
        }

        match self.abandon_policy {
            AbandonPolicy::Requeue => {
                for package in outcome.redelivery {
                    self.settle_counted(Sink::Packages, package, saturated, report);
                }
            }
            AbandonPolicy::Drop => {
                let count = outcome.redelivery.len();
                if count > 0 {
                    warn!("按放弃策略丢弃 {} 个未投递包裹", count);
                    self.metrics.record_abandoned(count);
                    report.abandoned += count as u64;
                }
            }
        }
    }
}
