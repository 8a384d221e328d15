//! Mock implementations for deterministic tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use courier_core::{Channel, DrawSource, PopError, PushError};

/// 按脚本依次返回随机数
///
/// 脚本耗尽后返回 `fallback`，默认 0.0（一定投递成功）。
/// `consumed()` 可以在克隆之间共享，用于断言实际抽取次数。
#[derive(Debug, Clone)]
pub struct ScriptedDraws {
    script: VecDeque<f64>,
    fallback: f64,
    consumed: Arc<AtomicUsize>,
}

impl ScriptedDraws {
    pub fn new(script: impl IntoIterator<Item = f64>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: 0.0,
            consumed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 每次都返回同一个值
    pub fn constant(value: f64) -> Self {
        Self::new([]).with_fallback(value)
    }

    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.consumed)
    }
}

impl DrawSource for ScriptedDraws {
    fn draw(&mut self) -> f64 {
        self.consumed.fetch_add(1, Ordering::SeqCst);
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

/// 不阻塞的内存队列
///
/// 所有带超时的操作都立即返回，适合单线程地驱动组件。
#[derive(Debug)]
pub struct VecQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: Option<usize>,
}

impl<T> Default for VecQueue<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: None,
        }
    }
}

impl<T> VecQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 超过 `capacity` 时推送返回 `PushError::Full`
    pub fn bounded(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: Some(capacity),
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send> Channel<T> for VecQueue<T> {
    fn push(&self, item: T, _timeout: Duration) -> Result<(), PushError<T>> {
        self.try_push(item)
    }

    fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let mut items = self.items();
        if self.capacity.is_some_and(|capacity| items.len() >= capacity) {
            return Err(PushError::Full(item));
        }
        items.push_back(item);
        Ok(())
    }

    fn pop(&self, _timeout: Duration) -> Result<T, PopError> {
        self.try_pop()
    }

    fn try_pop(&self) -> Result<T, PopError> {
        self.items().pop_front().ok_or(PopError::Empty)
    }

    fn len(&self) -> usize {
        self.items().len()
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
