use thiserror::Error;

/// 流水线错误类型定义
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("箱子超载: {count} 个包裹超过容量 {capacity}")]
    BoxOverfilled { count: usize, capacity: usize },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("队列已关闭: {0}")]
    QueueClosed(String),

    #[error("运行时错误: {0}")]
    Runtime(String),

    #[error("工作单元异常退出: {name}")]
    WorkerPanicked { name: String },

    #[error("内部错误: {0}")]
    Internal(String),
}

impl CourierError {
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn queue_closed<S: Into<String>>(queue: S) -> Self {
        Self::QueueClosed(queue.into())
    }

    /// 不变量被破坏，说明存在程序缺陷而不是运行时故障
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, CourierError::BoxOverfilled { .. })
    }
}

impl From<std::io::Error> for CourierError {
    fn from(err: std::io::Error) -> Self {
        CourierError::Runtime(err.to_string())
    }
}

impl From<anyhow::Error> for CourierError {
    fn from(err: anyhow::Error) -> Self {
        CourierError::Internal(err.to_string())
    }
}
