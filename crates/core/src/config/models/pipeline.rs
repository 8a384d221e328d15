use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 装箱策略名称
pub const FILL_STRATEGIES: [&str; 3] = ["random", "fifo", "lightest_first"];

/// 包裹源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub instances: i32,
    pub delay_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            instances: 4,
            delay_ms: 100,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.instances < 0 {
            return Err(anyhow::anyhow!(
                "包裹源实例数不能为负数: {}",
                self.instances
            ));
        }

        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// 溢出包裹的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// 放回包裹队列等待下一轮装箱
    #[default]
    Requeue,
    /// 直接丢弃
    Drop,
    /// 留在装箱器自己的缓冲区，下一轮优先装箱
    Carry,
}

/// 装箱器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackerConfig {
    pub instances: i32,
    pub capacity: usize,
    /// 每轮额外拉取的包裹比例，装箱前缓冲区至少达到 `capacity * (1 + extra_fraction)`
    pub extra_fraction: f64,
    pub overflow_policy: OverflowPolicy,
    pub strategy: String,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            instances: 1,
            capacity: 64,
            extra_fraction: 0.2,
            overflow_policy: OverflowPolicy::Requeue,
            strategy: "random".to_string(),
        }
    }
}

impl PackerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.instances <= 0 {
            return Err(anyhow::anyhow!(
                "装箱器实例数必须大于0: {}",
                self.instances
            ));
        }

        if self.capacity == 0 {
            return Err(anyhow::anyhow!("箱子容量必须大于0"));
        }

        if !self.extra_fraction.is_finite() || self.extra_fraction < 0.0 {
            return Err(anyhow::anyhow!(
                "额外拉取比例不能小于0: {}",
                self.extra_fraction
            ));
        }

        if !FILL_STRATEGIES.contains(&self.strategy.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的装箱策略: {}，支持的策略: {:?}",
                self.strategy,
                FILL_STRATEGIES
            ));
        }

        Ok(())
    }

    /// 每轮装箱前需要累积的包裹数
    pub fn packages_to_pull(&self) -> usize {
        Self::pull_target(self.capacity, self.extra_fraction)
    }

    /// 按容量和额外比例计算拉取数量，至少为 1
    pub fn pull_target(capacity: usize, extra_fraction: f64) -> usize {
        ((capacity as f64 * (1.0 + extra_fraction)).ceil() as usize).max(1)
    }
}

/// 车队配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub workers: i32,
    pub transit_delay_ms: u64,
    pub incorrect_address_probability: f64,
    pub vehicle_fault_probability: f64,
    pub internal_queue_capacity: usize,
    /// 固定随机种子，便于复现
    pub seed: Option<u64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            transit_delay_ms: 10,
            incorrect_address_probability: 0.01,
            vehicle_fault_probability: 0.01,
            internal_queue_capacity: 8,
            seed: None,
        }
    }
}

impl FleetConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers <= 0 {
            return Err(anyhow::anyhow!("车辆数必须大于0: {}", self.workers));
        }

        for (name, value) in [
            ("地址错误概率", self.incorrect_address_probability),
            ("车辆故障概率", self.vehicle_fault_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow::anyhow!("{}必须在0到1之间: {}", name, value));
            }
        }

        if self.incorrect_address_probability + self.vehicle_fault_probability > 1.0 {
            return Err(anyhow::anyhow!("失败概率之和不能超过1"));
        }

        if self.internal_queue_capacity == 0 {
            return Err(anyhow::anyhow!("车队内部队列容量必须大于0"));
        }

        Ok(())
    }

    pub fn transit_delay(&self) -> Duration {
        Duration::from_millis(self.transit_delay_ms)
    }
}

/// 强制取消车辆时，未完成箱子的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonPolicy {
    /// 未完成的包裹放回包裹队列
    #[default]
    Requeue,
    /// 记录后丢弃
    Drop,
}

/// 调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub poll_interval_ms: u64,
    pub abandon_policy: AbandonPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            abandon_policy: AbandonPolicy::Requeue,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("调度轮询间隔必须大于0"));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
