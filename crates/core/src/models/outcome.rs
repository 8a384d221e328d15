use serde::Serialize;

use crate::models::Package;

/// 一辆车完成一个箱子后的投递结果
///
/// 箱内的每个包裹恰好出现在三个序列之一。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub delivered: Vec<Package>,
    pub redelivery: Vec<Package>,
    pub incorrect: Vec<Package>,
}

impl DeliveryOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// 结果中包裹的总数
    pub fn total(&self) -> usize {
        self.delivered.len() + self.redelivery.len() + self.incorrect.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// 把另一份结果并入当前结果
    pub fn merge(&mut self, other: DeliveryOutcome) {
        self.delivered.extend(other.delivered);
        self.redelivery.extend(other.redelivery);
        self.incorrect.extend(other.incorrect);
    }
}

/// 单次投递尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryAttempt {
    Delivered,
    /// 地址错误，永久失败
    IncorrectAddress,
    /// 车辆故障，本箱剩余包裹全部重新投递
    VehicleFault,
}
