use courier_core::{DeliveryAttempt, FleetConfig};

/// 单次投递的失败概率
///
/// 抽取值 `draw > 1 - vehicle_fault` 判为车辆故障，
/// `draw > 1 - vehicle_fault - incorrect_address` 判为地址错误，其余为成功。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryOdds {
    vehicle_fault: f64,
    incorrect_address: f64,
}

impl DeliveryOdds {
    pub fn new(vehicle_fault: f64, incorrect_address: f64) -> Self {
        Self {
            vehicle_fault,
            incorrect_address,
        }
    }

    pub fn from_config(config: &FleetConfig) -> Self {
        Self::new(
            config.vehicle_fault_probability,
            config.incorrect_address_probability,
        )
    }

    /// 永不失败
    pub fn reliable() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn classify(&self, draw: f64) -> DeliveryAttempt {
        if draw > 1.0 - self.vehicle_fault {
            DeliveryAttempt::VehicleFault
        } else if draw > 1.0 - self.vehicle_fault - self.incorrect_address {
            DeliveryAttempt::IncorrectAddress
        } else {
            DeliveryAttempt::Delivered
        }
    }
}

impl Default for DeliveryOdds {
    fn default() -> Self {
        Self::from_config(&FleetConfig::default())
    }
}
