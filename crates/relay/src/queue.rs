//! Sample queues
//!
//! One unbounded FIFO per sample kind (single producer, single consumer)
//! with a bounded-wait receive.

use std::time::Duration;

use async_channel::{unbounded, Receiver, Sender};

/// Outcome of a bounded-wait dequeue
#[derive(Debug, PartialEq)]
pub enum Dequeue<T> {
    Item(T),
    /// Wait elapsed without data
    TimedOut,
    /// All senders dropped and the queue is drained
    Closed,
}

/// Producer side
pub type QueueSender<T> = Sender<T>;

/// Consumer side
#[derive(Debug, Clone)]
pub struct QueueReceiver<T> {
    rx: Receiver<T>,
}

/// Create a sample queue
pub fn sample_queue<T>() -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = unbounded();
    (tx, QueueReceiver { rx })
}

impl<T> QueueReceiver<T> {
    /// Receive, waiting at most `wait` (`None` = no bound)
    pub async fn recv_timeout(&self, wait: Option<Duration>) -> Dequeue<T> {
        let result = match wait {
            Some(wait) => match tokio::time::timeout(wait, self.rx.recv()).await {
                Ok(result) => result,
                Err(_) => return Dequeue::TimedOut,
            },
            None => self.rx.recv().await,
        };
        match result {
            Ok(item) => Dequeue::Item(item),
            Err(_) => Dequeue::Closed,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_item_then_timeout() {
        let (tx, rx) = sample_queue();
        tx.send(7u32).await.unwrap();
        assert_eq!(rx.recv_timeout(Some(Duration::from_secs(10))).await, Dequeue::Item(7));

        let start = tokio::time::Instant::now();
        assert_eq!(rx.recv_timeout(Some(Duration::from_secs(10))).await, Dequeue::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_fifo_then_closed() {
        let (tx, rx) = sample_queue();
        for i in 0..3u32 {
            tx.send(i).await.unwrap();
        }
        drop(tx);
        for i in 0..3u32 {
            assert_eq!(rx.recv_timeout(None).await, Dequeue::Item(i));
        }
        assert_eq!(rx.recv_timeout(None).await, Dequeue::Closed);
    }
}
