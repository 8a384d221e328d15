use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// 推送失败时把元素交还给调用方
#[derive(Debug, PartialEq)]
pub enum PushError<T> {
    Full(T),
    Closed(T),
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => f.write_str("队列已满"),
            PushError::Closed(_) => f.write_str("队列已关闭"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for PushError<T> {}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(item) | PushError::Closed(item) => item,
        }
    }
}

/// 弹出失败。`Empty` 表示暂时没有元素，属于正常控制流
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    #[error("队列为空")]
    Empty,
    #[error("队列已关闭")]
    Closed,
}

/// 跨执行域共享的 FIFO 通道抽象
///
/// 多生产者多消费者，所有阻塞操作都带超时，调用方借此定期检查关闭信号。
pub trait Channel<T>: Send + Sync {
    /// 推送元素，队列有界且已满时最多等待 `timeout`
    fn push(&self, item: T, timeout: Duration) -> Result<(), PushError<T>>;

    /// 非阻塞推送
    fn try_push(&self, item: T) -> Result<(), PushError<T>>;

    /// 弹出元素，队列为空时最多等待 `timeout`
    fn pop(&self, timeout: Duration) -> Result<T, PopError>;

    /// 非阻塞弹出
    fn try_pop(&self) -> Result<T, PopError>;

    /// 当前队列深度（近似值）
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 队列上限，`None` 表示无界
    fn capacity(&self) -> Option<usize>;

    /// 非阻塞地取出当前所有元素
    fn drain(&self) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(item) = self.try_pop() {
            items.push(item);
        }
        items
    }
}

/// 带超时地重复推送，直到成功、队列关闭或观察到关闭信号
///
/// 失败时把元素交还给调用方，由调用方决定如何处理。
pub fn push_until_shutdown<T>(
    queue: &dyn Channel<T>,
    mut item: T,
    timeout: Duration,
    shutdown: &crate::ShutdownListener,
) -> Result<(), T> {
    loop {
        match queue.push(item, timeout) {
            Ok(()) => return Ok(()),
            Err(PushError::Full(rejected)) => {
                if shutdown.is_shutdown() {
                    return Err(rejected);
                }
                item = rejected;
            }
            Err(PushError::Closed(rejected)) => return Err(rejected),
        }
    }
}
