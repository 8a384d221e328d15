use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use courier_core::{
    AppConfig, Channel, CourierError, CourierResult, Package, PickupBox, PipelineMetrics,
    PipelineSnapshot, QueueDepths, ShutdownSignal,
};
use courier_dispatcher::{CarDispatcher, DispatchReport, DispatcherQueues};
use courier_infrastructure::BlockingQueue;
use courier_worker::{BoxPacker, PackageSource};
use tracing::{error, info, warn};

use crate::aggregator::ResultAggregator;

/// 流水线中的四个跨线程队列
#[derive(Debug, Clone)]
pub struct PipelineQueues {
    pub packages: Arc<BlockingQueue<Package>>,
    pub boxes: Arc<BlockingQueue<PickupBox>>,
    pub successful: Arc<BlockingQueue<Package>>,
    pub failed: Arc<BlockingQueue<Package>>,
}

impl PipelineQueues {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            packages: Arc::new(BlockingQueue::new("packages", config.queues.package_bound())),
            boxes: Arc::new(BlockingQueue::new("boxes", config.queues.box_bound())),
            successful: Arc::new(BlockingQueue::unbounded("successful")),
            failed: Arc::new(BlockingQueue::unbounded("failed")),
        }
    }
}

/// 只读的流水线观测接口，核心组件从不主动调用
#[derive(Clone)]
pub struct PipelineMonitor {
    packages: Arc<dyn Channel<Package>>,
    boxes: Arc<dyn Channel<PickupBox>>,
    successful: Arc<dyn Channel<Package>>,
    failed: Arc<dyn Channel<Package>>,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineMonitor {
    pub fn new(queues: &PipelineQueues, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            packages: queues.packages.clone(),
            boxes: queues.boxes.clone(),
            successful: queues.successful.clone(),
            failed: queues.failed.clone(),
            metrics,
        }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let queues = QueueDepths {
            packages: self.packages.len(),
            boxes: self.boxes.len(),
            successful: self.successful.len(),
            failed: self.failed.len(),
        };
        PipelineSnapshot::new(queues, self.metrics.counters())
    }
}

/// `stop()` 的结果
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// 成功回收的线程数
    pub joined: usize,
    pub failures: Vec<String>,
    pub dispatch: Option<DispatchReport>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn join<T>(&mut self, name: &str, handle: JoinHandle<CourierResult<T>>) -> Option<T> {
        match handle.join() {
            Ok(Ok(value)) => {
                self.joined += 1;
                Some(value)
            }
            Ok(Err(e)) => {
                self.joined += 1;
                error!("{} 异常退出: {}", name, e);
                self.failures.push(format!("{name}: {e}"));
                None
            }
            Err(_) => {
                let e = CourierError::WorkerPanicked {
                    name: name.to_string(),
                };
                error!("{}", e);
                self.failures.push(e.to_string());
                None
            }
        }
    }
}

#[derive(Default)]
struct RunningUnits {
    sources: Vec<(String, JoinHandle<CourierResult<()>>)>,
    packers: Vec<(String, JoinHandle<CourierResult<()>>)>,
    dispatcher: Option<JoinHandle<CourierResult<DispatchReport>>>,
    aggregator: Option<JoinHandle<CourierResult<()>>>,
}

enum AppState {
    Created,
    Running(RunningUnits),
    Stopped,
}

/// 包裹投递流水线
pub struct Application {
    config: AppConfig,
    queues: PipelineQueues,
    metrics: Arc<PipelineMetrics>,
    shutdown: ShutdownSignal,
    drain: ShutdownSignal,
    state: AppState,
}

impl Application {
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate().context("流水线配置无效")?;

        let queues = PipelineQueues::from_config(&config);
        info!(
            "创建流水线: {} 个包裹来源, {} 个装箱器, {} 辆投递车",
            config.source.instances, config.packer.instances, config.fleet.workers
        );

        Ok(Self {
            config,
            queues,
            metrics: Arc::new(PipelineMetrics::new()),
            shutdown: ShutdownSignal::new(),
            drain: ShutdownSignal::new(),
            state: AppState::Created,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn queues(&self) -> &PipelineQueues {
        &self.queues
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, AppState::Running(_))
    }

    pub fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor::new(&self.queues, Arc::clone(&self.metrics))
    }

    /// 启动全部组件，重复调用返回错误
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.state, AppState::Created) {
            return Err(anyhow::anyhow!("流水线已经启动过"));
        }
        self.state = AppState::Running(RunningUnits::default());

        if let Err(e) = self.spawn_units() {
            error!("启动流水线失败: {:#}", e);
            self.stop();
            return Err(e);
        }

        info!("流水线已启动");
        Ok(())
    }

    fn spawn_units(&mut self) -> Result<()> {
        let AppState::Running(units) = &mut self.state else {
            return Err(anyhow::anyhow!("流水线未处于运行状态"));
        };
        let config = &self.config;
        let poll_timeout = config.queues.poll_timeout();

        let aggregator = ResultAggregator::new(
            self.queues.successful.clone(),
            self.queues.failed.clone(),
            poll_timeout,
            config.observability.report_interval(),
            Arc::clone(&self.metrics),
        );
        units.aggregator = Some(
            aggregator
                .spawn(self.drain.listener())
                .context("启动结果汇总器失败")?,
        );

        let dispatcher = CarDispatcher::new(
            DispatcherQueues {
                boxes: self.queues.boxes.clone(),
                packages: self.queues.packages.clone(),
                successful: self.queues.successful.clone(),
                failed: self.queues.failed.clone(),
            },
            &config.fleet,
            &config.dispatcher,
            poll_timeout,
            Arc::clone(&self.metrics),
        );
        units.dispatcher = Some(
            dispatcher
                .spawn(self.shutdown.listener())
                .context("启动调度器失败")?,
        );

        for id in 0..config.packer.instances.max(0) as usize {
            let packages = self.queues.packages.clone();
            let packer = BoxPacker::builder(id, packages, self.queues.boxes.clone())
                .config(&config.packer)?
                .poll_timeout(poll_timeout)
                .metrics(Arc::clone(&self.metrics))
                .build();
            let handle = packer
                .spawn(self.shutdown.listener())
                .with_context(|| format!("启动装箱器 {id} 失败"))?;
            units.packers.push((format!("box-packer-{id}"), handle));
        }

        for id in 0..config.source.instances.max(0) as usize {
            let source = PackageSource::new(
                id,
                self.queues.packages.clone(),
                &config.source,
                poll_timeout,
                Arc::clone(&self.metrics),
            );
            let handle = source
                .spawn(self.shutdown.listener())
                .with_context(|| format!("启动包裹来源 {id} 失败"))?;
            units.sources.push((format!("package-source-{id}"), handle));
        }

        Ok(())
    }

    /// 触发关闭并等待所有组件退出，可以重复调用
    pub fn stop(&mut self) -> ShutdownReport {
        let units = match std::mem::replace(&mut self.state, AppState::Stopped) {
            AppState::Running(units) => units,
            AppState::Created => {
                self.state = AppState::Created;
                return ShutdownReport::default();
            }
            AppState::Stopped => return ShutdownReport::default(),
        };

        info!("开始关闭流水线");
        self.shutdown.shutdown();
        let mut report = ShutdownReport::default();

        for (name, handle) in units.sources {
            report.join(&name, handle);
        }
        for (name, handle) in units.packers {
            report.join(&name, handle);
        }
        if let Some(handle) = units.dispatcher {
            report.dispatch = report.join("car-dispatcher", handle);
        }

        // 调度器退出后才能清空结果队列
        self.drain.shutdown();
        if let Some(handle) = units.aggregator {
            report.join("result-aggregator", handle);
        }

        let snapshot = self.monitor().snapshot();
        if report.is_clean() {
            info!(
                joined = report.joined,
                packages_left = snapshot.queues.packages,
                boxes_left = snapshot.queues.boxes,
                "流水线已关闭"
            );
        } else {
            warn!(
                joined = report.joined,
                failures = report.failures.len(),
                "流水线关闭时有组件异常退出"
            );
        }
        report
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("流水线未显式关闭, 在释放时关闭");
            self.stop();
        }
    }
}
