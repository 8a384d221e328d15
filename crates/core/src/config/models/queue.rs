use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 跨执行域队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 包裹队列容量（0表示无限制）
    pub package_capacity: usize,
    /// 箱子队列容量（0表示无限制）
    pub box_capacity: usize,
    /// 所有阻塞操作的最长等待时间（毫秒）
    pub poll_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            package_capacity: 0,
            box_capacity: 0,
            poll_timeout_ms: 100,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_timeout_ms == 0 {
            return Err(anyhow::anyhow!("队列轮询超时必须大于0"));
        }

        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn package_bound(&self) -> Option<usize> {
        (self.package_capacity > 0).then_some(self.package_capacity)
    }

    pub fn box_bound(&self) -> Option<usize> {
        (self.box_capacity > 0).then_some(self.box_capacity)
    }
}
