use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info};

/// 关闭协调器
///
/// 全局唯一的关闭信号，只能从 `false` 变为 `true`，不会复位。
/// 持有者可以触发关闭，其他组件只拿到只读的 [`ShutdownListener`]。
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// 创建新的关闭信号
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// 获取只读监听句柄
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// 触发关闭，返回本次调用是否真正改变了状态
    pub fn shutdown(&self) -> bool {
        let was_shutdown = self.tx.send_replace(true);
        if was_shutdown {
            debug!("关闭信号已经触发过");
            return false;
        }

        info!(
            subscribers = self.tx.receiver_count(),
            "触发流水线关闭"
        );
        true
    }

    /// 检查是否已经关闭
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// 关闭信号的只读句柄
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待关闭信号（协作式执行域使用）
    pub async fn notified(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stopped| *stopped).await.is_err() {
            // 信号源已经释放且从未触发，之后也不会再触发
            std::future::pending::<()>().await;
        }
    }

    /// 阻塞睡眠 `duration`，按 `slice` 切片检查关闭信号
    ///
    /// 返回 `true` 表示睡眠期间观察到关闭。
    pub fn sleep(&self, duration: Duration, slice: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let slice = slice.max(Duration::from_millis(1));

        loop {
            if self.is_shutdown() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(slice.min(deadline - now));
        }
    }
}
