use std::fmt;
use std::time::Duration;

use crossbeam::channel::{
    self, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use courier_core::{Channel, PopError, PushError};
use tracing::{debug, info};

/// 内存阻塞队列
///
/// 基于 crossbeam channel 的多生产者多消费者 FIFO 队列，供并行线程和协作式
/// 调度器之间共享。队列同时持有发送端和接收端，因此在自身被释放之前不会断开。
pub struct BlockingQueue<T> {
    name: String,
    sender: Sender<T>,
    receiver: Receiver<T>,
    bound: Option<usize>,
}

impl<T> BlockingQueue<T> {
    /// 创建队列，`bound` 为 `None` 时无容量限制
    pub fn new(name: impl Into<String>, bound: Option<usize>) -> Self {
        let name = name.into();
        let (sender, receiver) = match bound {
            Some(capacity) => channel::bounded(capacity),
            None => channel::unbounded(),
        };

        info!(queue = %name, bound = ?bound, "创建内存队列");

        Self {
            name,
            sender,
            receiver,
            bound,
        }
    }

    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    pub fn bounded(name: impl Into<String>, capacity: usize) -> Self {
        Self::new(name, Some(capacity))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Send> Channel<T> for BlockingQueue<T> {
    fn push(&self, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        self.sender.send_timeout(item, timeout).map_err(|e| match e {
            SendTimeoutError::Timeout(item) => {
                debug!(queue = %self.name, "队列已满，推送超时");
                PushError::Full(item)
            }
            SendTimeoutError::Disconnected(item) => PushError::Closed(item),
        })
    }

    fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        self.sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => PushError::Full(item),
            TrySendError::Disconnected(item) => PushError::Closed(item),
        })
    }

    fn pop(&self, timeout: Duration) -> Result<T, PopError> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => PopError::Empty,
            RecvTimeoutError::Disconnected => PopError::Closed,
        })
    }

    fn try_pop(&self) -> Result<T, PopError> {
        self.receiver.try_recv().map_err(|e| match e {
            TryRecvError::Empty => PopError::Empty,
            TryRecvError::Disconnected => PopError::Closed,
        })
    }

    fn len(&self) -> usize {
        self.receiver.len()
    }

    fn capacity(&self) -> Option<usize> {
        self.bound
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("name", &self.name)
            .field("len", &self.receiver.len())
            .field("bound", &self.bound)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_push_and_pop_fifo() {
        let queue = BlockingQueue::unbounded("test_queue");

        for i in 0..5 {
            queue.push(i, Duration::from_millis(10)).unwrap();
        }
        assert_eq!(queue.len(), 5);

        let popped: Vec<i32> = (0..5)
            .map(|_| queue.pop(Duration::from_millis(10)).unwrap())
            .collect();
        assert_eq!(popped, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_times_out_when_empty() {
        let queue: BlockingQueue<i32> = BlockingQueue::unbounded("empty_queue");

        let started = Instant::now();
        let result = queue.pop(Duration::from_millis(30));
        assert_eq!(result, Err(PopError::Empty));
        assert!(started.elapsed() >= Duration::from_millis(25));

        assert_eq!(queue.try_pop(), Err(PopError::Empty));
    }

    #[test]
    fn test_bounded_push_returns_item_when_full() {
        let queue = BlockingQueue::bounded("bounded_queue", 2);
        assert_eq!(queue.capacity(), Some(2));

        queue.try_push(1).unwrap();
        queue.try_push(2).unwrap();

        assert_eq!(queue.try_push(3), Err(PushError::Full(3)));
        let err = queue.push(4, Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.into_inner(), 4);

        assert_eq!(queue.pop(Duration::from_millis(10)), Ok(1));
        queue.push(5, Duration::from_millis(10)).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = BlockingQueue::unbounded("drain_queue");
        for i in 0..3 {
            queue.try_push(i).unwrap();
        }

        assert_eq!(queue.drain(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_multiple_producers_and_consumers() {
        let queue = Arc::new(BlockingQueue::bounded("mpmc_queue", 16));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250 {
                        let mut item = p * 1000 + i;
                        loop {
                            match queue.push(item, Duration::from_millis(10)) {
                                Ok(()) => break,
                                Err(e) => item = e.into_inner(),
                            }
                        }
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut received = Vec::new();
                    while let Ok(item) = queue.pop(Duration::from_millis(200)) {
                        received.push(item);
                    }
                    received
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }

        let mut all: Vec<i32> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }
}
