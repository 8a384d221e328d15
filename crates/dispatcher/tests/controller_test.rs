use std::sync::Arc;
use std::time::Duration;

use courier_core::{
    AbandonPolicy, Channel, DispatcherConfig, DrawSource, FleetConfig, Package, PickupBox,
    PipelineMetrics, ShutdownSignal,
};
use courier_dispatcher::{CarDispatcher, DispatchReport, DispatcherQueues, DrawFactory};
use courier_infrastructure::BlockingQueue;
use courier_testing_utils::{box_of, package_batch, wait_for, ScriptedDraws};

struct Harness {
    boxes: Arc<BlockingQueue<PickupBox>>,
    packages: Arc<BlockingQueue<Package>>,
    successful: Arc<BlockingQueue<Package>>,
    failed: Arc<BlockingQueue<Package>>,
    metrics: Arc<PipelineMetrics>,
    signal: ShutdownSignal,
}

impl Harness {
    fn new() -> Self {
        Self {
            boxes: Arc::new(BlockingQueue::unbounded("boxes")),
            packages: Arc::new(BlockingQueue::unbounded("packages")),
            successful: Arc::new(BlockingQueue::unbounded("successful")),
            failed: Arc::new(BlockingQueue::unbounded("failed")),
            metrics: Arc::new(PipelineMetrics::new()),
            signal: ShutdownSignal::new(),
        }
    }

    fn dispatcher(&self, fleet: FleetConfig, abandon_policy: AbandonPolicy) -> CarDispatcher {
        let queues = DispatcherQueues {
            boxes: self.boxes.clone(),
            packages: self.packages.clone(),
            successful: self.successful.clone(),
            failed: self.failed.clone(),
        };
        let config = DispatcherConfig {
            poll_interval_ms: 1,
            abandon_policy,
        };

        CarDispatcher::new(
            queues,
            &fleet,
            &config,
            Duration::from_millis(20),
            self.metrics.clone(),
        )
    }

    fn start(&self, dispatcher: CarDispatcher) -> tokio::task::JoinHandle<DispatchReport> {
        let listener = self.signal.listener();
        tokio::spawn(async move { dispatcher.run_until_shutdown(listener).await.unwrap() })
    }

    async fn stop(&self, handle: tokio::task::JoinHandle<DispatchReport>) -> DispatchReport {
        self.signal.shutdown();
        handle.await.unwrap()
    }
}

fn fleet(workers: i32, transit_delay_ms: u64) -> FleetConfig {
    FleetConfig {
        workers,
        transit_delay_ms,
        ..FleetConfig::default()
    }
}

fn scripted(draws: ScriptedDraws) -> DrawFactory {
    Arc::new(move |_: usize| Box::new(draws.clone()) as Box<dyn DrawSource>)
}

#[tokio::test]
async fn test_routes_outcome_to_sinks() {
    let harness = Harness::new();
    let packages = package_batch(3);
    let ids: Vec<_> = packages.iter().map(|p| p.id).collect();
    harness.boxes.try_push(box_of(packages)).unwrap();

    let dispatcher = harness
        .dispatcher(fleet(1, 0), AbandonPolicy::Requeue)
        .with_draws(scripted(ScriptedDraws::new([0.5, 0.985, 0.995])));
    let handle = harness.start(dispatcher);

    assert!(
        wait_for(Duration::from_secs(2), || {
            harness.successful.len() == 1
                && harness.failed.len() == 1
                && harness.packages.len() == 1
        })
        .await
    );
    let report = harness.stop(handle).await;

    assert_eq!(harness.successful.try_pop().unwrap().id, ids[0]);
    assert_eq!(harness.failed.try_pop().unwrap().id, ids[1]);
    // 重新投递的包裹保持原有标识
    assert_eq!(harness.packages.try_pop().unwrap().id, ids[2]);

    assert_eq!(report.boxes_dispatched, 1);
    assert_eq!(report.outcomes_routed, 1);
    assert_eq!(report.abandoned, 0);

    let counters = harness.metrics.counters();
    assert_eq!(counters.boxes_delivered, 1);
    assert_eq!(counters.packages_delivered, 1);
    assert_eq!(counters.packages_incorrect, 1);
    assert_eq!(counters.packages_redelivered, 1);
}

#[tokio::test]
async fn test_fleet_delivers_all_boxes() {
    let harness = Harness::new();
    for _ in 0..8 {
        harness.boxes.try_push(box_of(package_batch(4))).unwrap();
    }

    let dispatcher = harness
        .dispatcher(fleet(4, 0), AbandonPolicy::Requeue)
        .with_draws(scripted(ScriptedDraws::constant(0.0)));
    let handle = harness.start(dispatcher);

    assert!(wait_for(Duration::from_secs(5), || harness.successful.len() == 32).await);
    let report = harness.stop(handle).await;

    assert_eq!(report.boxes_dispatched, 8);
    assert_eq!(report.outcomes_routed, 8);
    assert!(harness.boxes.is_empty());
    assert!(harness.packages.is_empty());
    assert!(harness.failed.is_empty());
}

#[tokio::test]
async fn test_shutdown_requeues_in_flight_packages() {
    let harness = Harness::new();
    let packages = package_batch(3);
    let mut ids: Vec<_> = packages.iter().map(|p| p.id).collect();
    harness.boxes.try_push(box_of(packages)).unwrap();

    let dispatcher = harness
        .dispatcher(fleet(1, 60_000), AbandonPolicy::Requeue)
        .with_draws(scripted(ScriptedDraws::constant(0.0)));
    let handle = harness.start(dispatcher);

    assert!(wait_for(Duration::from_secs(2), || harness.boxes.is_empty()).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = harness.stop(handle).await;

    assert_eq!(report.requeued_on_shutdown, 3);
    assert_eq!(report.abandoned, 0);
    assert!(harness.successful.is_empty());

    let mut requeued: Vec<_> = harness.packages.drain().into_iter().map(|p| p.id).collect();
    requeued.sort();
    ids.sort();
    assert_eq!(requeued, ids);
}

#[tokio::test]
async fn test_shutdown_drops_in_flight_packages_under_drop_policy() {
    let harness = Harness::new();
    harness.boxes.try_push(box_of(package_batch(3))).unwrap();

    let dispatcher = harness
        .dispatcher(fleet(1, 60_000), AbandonPolicy::Drop)
        .with_draws(scripted(ScriptedDraws::constant(0.0)));
    let handle = harness.start(dispatcher);

    assert!(wait_for(Duration::from_secs(2), || harness.boxes.is_empty()).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = harness.stop(handle).await;

    assert_eq!(report.abandoned, 3);
    assert!(harness.packages.is_empty());
    assert_eq!(harness.metrics.counters().packages_abandoned, 3);
}

#[tokio::test]
async fn test_full_fleet_queue_keeps_box_for_next_round() {
    let harness = Harness::new();
    for _ in 0..4 {
        harness.boxes.try_push(box_of(package_batch(2))).unwrap();
    }

    let config = FleetConfig {
        internal_queue_capacity: 1,
        ..fleet(1, 60_000)
    };
    let dispatcher = harness
        .dispatcher(config, AbandonPolicy::Requeue)
        .with_draws(scripted(ScriptedDraws::constant(0.0)));
    let handle = harness.start(dispatcher);

    // 一箱在车上，一箱在车队队列，一箱由调度器暂存
    assert!(wait_for(Duration::from_secs(2), || harness.boxes.len() == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.boxes.len(), 1);

    let report = harness.stop(handle).await;

    assert_eq!(report.boxes_dispatched, 2);
    assert_eq!(report.requeued_on_shutdown, 6);
    assert_eq!(harness.packages.len(), 6);
    assert_eq!(harness.boxes.len(), 1);
}

#[tokio::test]
async fn test_idle_dispatcher_stops_cleanly() {
    let harness = Harness::new();
    let handle = harness.start(harness.dispatcher(fleet(2, 0), AbandonPolicy::Requeue));

    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = harness.stop(handle).await;

    assert_eq!(report, DispatchReport::default());
}

#[tokio::test]
async fn test_full_package_queue_does_not_stall_dispatch() {
    let harness = Harness {
        packages: Arc::new(BlockingQueue::new("packages", Some(1))),
        ..Harness::new()
    };
    harness.packages.try_push(package_batch(1).remove(0)).unwrap();
    for _ in 0..6 {
        harness.boxes.try_push(box_of(package_batch(2))).unwrap();
    }

    // 每辆车第一次抽取就故障，所有包裹都要重新投递
    let dispatcher = harness
        .dispatcher(fleet(2, 0), AbandonPolicy::Requeue)
        .with_draws(scripted(ScriptedDraws::constant(0.999)));
    let handle = harness.start(dispatcher);

    assert!(
        wait_for(Duration::from_secs(2), || {
            harness.metrics.counters().boxes_delivered == 6
        })
        .await
    );
    assert!(harness.boxes.is_empty());
    assert_eq!(harness.packages.len(), 1);

    // 腾出空位后积压的包裹继续入队
    harness.packages.try_pop().unwrap();
    assert!(wait_for(Duration::from_secs(2), || harness.packages.len() == 1).await);

    let report = harness.stop(handle).await;
    assert_eq!(report.boxes_dispatched, 6);
    assert_eq!(report.outcomes_routed, 6);
    assert_eq!(report.requeued_on_shutdown, 0);
    assert_eq!(report.abandoned, 11);
    assert_eq!(harness.metrics.counters().packages_redelivered, 12);
    assert_eq!(harness.metrics.counters().packages_abandoned, 11);
}

#[tokio::test]
async fn test_shutdown_counts_settled_in_flight_packages() {
    let harness = Harness::new();
    harness.boxes.try_push(box_of(package_batch(3))).unwrap();

    // 第一个包裹地址错误不需要运输，第二个包裹在运输途中被中止
    let dispatcher = harness
        .dispatcher(fleet(1, 60_000), AbandonPolicy::Requeue)
        .with_draws(scripted(ScriptedDraws::new([0.985, 0.5])));
    let handle = harness.start(dispatcher);

    assert!(wait_for(Duration::from_secs(2), || harness.boxes.is_empty()).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = harness.stop(handle).await;

    assert_eq!(report.requeued_on_shutdown, 2);
    assert_eq!(harness.failed.len(), 1);
    assert_eq!(harness.packages.len(), 2);

    let counters = harness.metrics.counters();
    assert_eq!(counters.packages_incorrect, 1);
    assert_eq!(counters.packages_delivered, 0);
    assert_eq!(counters.boxes_delivered, 0);
}
