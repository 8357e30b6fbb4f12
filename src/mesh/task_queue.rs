//! Priority task queue (§4.1, §5 ordering guarantees): strict priority
//! preemption at enqueue time, FIFO within a priority tier.

use crate::error::{MeshError, Result};
use crate::models::Task;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

struct QueuedTask {
    task: Task,
    seq: u64,
}

#[derive(Clone)]
pub struct TaskQueue {
    items: Arc<Mutex<Vec<QueuedTask>>>,
    next_seq: Arc<AtomicU64>,
    max_queue_size: usize,
}

impl TaskQueue {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
            max_queue_size,
        }
    }

    pub async fn enqueue(&self, task: Task) -> Result<()> {
        let mut items = self.items.lock().await;
        if items.len() >= self.max_queue_size {
            return Err(MeshError::Validation(format!(
                "task queue full (max: {})",
                self.max_queue_size
            )));
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        items.push(QueuedTask { task, seq });
        Ok(())
    }

    /// Removes and returns the highest-priority task, earliest-enqueued
    /// first among ties. `None` if the queue is empty.
    pub async fn dequeue_next(&self) -> Option<Task> {
        let mut items = self.items.lock().await;
        let winner = items
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.task.priority.cmp(&b.task.priority).then(b.seq.cmp(&a.seq)))
            .map(|(idx, _)| idx)?;
        Some(items.remove(winner).task)
    }

    pub async fn size(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn snapshot(&self) -> Vec<Task> {
        self.items.lock().await.iter().map(|q| q.task.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::Utc;
    use std::collections::HashSet;

    fn task(priority: Priority) -> Task {
        Task::new(
            "lead_qualification",
            priority,
            HashSet::new(),
            serde_json::json!({}),
            "requester-1",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn higher_priority_dequeues_first_regardless_of_order() {
        let queue = TaskQueue::new(10);
        queue.enqueue(task(Priority::Normal)).await.unwrap();
        let emergency = task(Priority::Emergency);
        let emergency_id = emergency.task_id;
        queue.enqueue(emergency).await.unwrap();

        let first = queue.dequeue_next().await.unwrap();
        assert_eq!(first.task_id, emergency_id);
    }

    #[tokio::test]
    async fn same_priority_is_fifo() {
        let queue = TaskQueue::new(10);
        let first = task(Priority::Normal);
        let first_id = first.task_id;
        queue.enqueue(first).await.unwrap();
        queue.enqueue(task(Priority::Normal)).await.unwrap();

        let dequeued = queue.dequeue_next().await.unwrap();
        assert_eq!(dequeued.task_id, first_id);
    }

    #[tokio::test]
    async fn full_queue_rejects_enqueue() {
        let queue = TaskQueue::new(1);
        queue.enqueue(task(Priority::Normal)).await.unwrap();
        assert!(queue.enqueue(task(Priority::Normal)).await.is_err());
    }
}
