use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::{Receiver, UnboundedSender};
use tracing::{debug, info, trace};

use courier_core::{DeliveryAttempt, DeliveryOutcome, DrawSource, Package, PickupBox};

use crate::delivery::DeliveryOdds;

/// 车队共享的箱子接收端
pub type SharedBoxReceiver = Arc<tokio::sync::Mutex<Receiver<PickupBox>>>;

/// 投递中的箱子
///
/// `remaining` 是尚未得出结果的包裹，`outcome` 是已经分类的包裹。
#[derive(Debug, Default)]
pub struct InFlight {
    pub outcome: DeliveryOutcome,
    pub remaining: VecDeque<Package>,
}

impl InFlight {
    /// 把未投递的包裹并入重新投递
    pub fn into_outcome(self) -> DeliveryOutcome {
        let mut outcome = self.outcome;
        outcome.redelivery.extend(self.remaining);
        outcome
    }
}

/// 单辆车的在途账本
///
/// 车辆任务被中止时，调度器从账本取回未完成的包裹。
#[derive(Debug, Clone, Default)]
pub struct InFlightLedger {
    inner: Arc<Mutex<Option<InFlight>>>,
}

impl InFlightLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, packages: Vec<Package>) {
        *self.lock() = Some(InFlight {
            outcome: DeliveryOutcome::new(),
            remaining: packages.into(),
        });
    }

    fn is_settled(&self) -> bool {
        self.lock()
            .as_ref()
            .map_or(true, |in_flight| in_flight.remaining.is_empty())
    }

    /// 把队首包裹归入对应结果
    fn settle(&self, attempt: DeliveryAttempt) {
        let mut guard = self.lock();
        let Some(in_flight) = guard.as_mut() else {
            return;
        };
        let Some(package) = in_flight.remaining.pop_front() else {
            return;
        };

        match attempt {
            DeliveryAttempt::Delivered => in_flight.outcome.delivered.push(package),
            DeliveryAttempt::IncorrectAddress => in_flight.outcome.incorrect.push(package),
            DeliveryAttempt::VehicleFault => in_flight.outcome.redelivery.push(package),
        }
    }

    fn finish(&self) -> DeliveryOutcome {
        self.take().map(InFlight::into_outcome).unwrap_or_default()
    }

    /// 取走在途箱子，没有时返回 `None`
    pub fn take(&self) -> Option<InFlight> {
        self.lock().take()
    }

    pub fn is_idle(&self) -> bool {
        self.lock().is_none()
    }
}

/// 投递车
///
/// 一次处理一个箱子，按箱内顺序逐个投递。
pub struct DeliveryCar {
    id: usize,
    odds: DeliveryOdds,
    transit_delay: Duration,
    draws: Box<dyn DrawSource>,
    ledger: InFlightLedger,
}

impl DeliveryCar {
    pub fn new(
        id: usize,
        odds: DeliveryOdds,
        transit_delay: Duration,
        draws: Box<dyn DrawSource>,
    ) -> Self {
        Self {
            id,
            odds,
            transit_delay,
            draws,
            ledger: InFlightLedger::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn ledger(&self) -> InFlightLedger {
        self.ledger.clone()
    }

    /// 投递一个箱子
    ///
    /// 车辆故障后本箱剩余包裹全部进入重新投递，不再抽取随机数。
    pub async fn deliver(&mut self, pickup_box: PickupBox) -> DeliveryOutcome {
        self.ledger.begin(pickup_box.into_packages());
        let mut faulted = false;

        while !self.ledger.is_settled() {
            let attempt = if faulted {
                DeliveryAttempt::VehicleFault
            } else {
                self.odds.classify(self.draws.draw())
            };

            match attempt {
                DeliveryAttempt::Delivered => {
                    if !self.transit_delay.is_zero() {
                        tokio::time::sleep(self.transit_delay).await;
                    }
                }
                DeliveryAttempt::IncorrectAddress => {
                    trace!("车辆 {} 遇到错误地址", self.id);
                }
                DeliveryAttempt::VehicleFault if !faulted => {
                    debug!("车辆 {} 发生故障, 本箱剩余包裹转为重新投递", self.id);
                    faulted = true;
                }
                DeliveryAttempt::VehicleFault => {}
            }

            self.ledger.settle(attempt);
        }

        self.ledger.finish()
    }

    /// 从车队队列取箱子投递，直到队列关闭或结果流断开
    pub async fn run(
        mut self,
        boxes: SharedBoxReceiver,
        results: UnboundedSender<DeliveryOutcome>,
    ) {
        info!("投递车 {} 出发", self.id);

        loop {
            let next = {
                let mut receiver = boxes.lock().await;
                receiver.recv().await
            };
            let Some(pickup_box) = next else {
                break;
            };

            let outcome = self.deliver(pickup_box).await;
            debug!(
                "投递车 {} 完成一箱: 成功 {}, 地址错误 {}, 重新投递 {}",
                self.id,
                outcome.delivered.len(),
                outcome.incorrect.len(),
                outcome.redelivery.len()
            );

            if results.send(outcome).is_err() {
                break;
            }
        }

        info!("投递车 {} 收车", self.id);
    }
}
