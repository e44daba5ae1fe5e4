//! FifoPolicy - 到着順に launch する最小の policy
//!
//! - QUEUED タスクは到着順の VecDeque に並ぶ
//! - `get_ready_tasks` のたびに空きノードを resource manager から借り、先頭から割り当てる
//! - FAILED タスクは次の `get_ready_tasks` でキューの末尾に戻す。
//!   `max_failures` 回失敗したものは再投入せず FAILED のまま保持する

use std::collections::VecDeque;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::{TaskId, TaskInfo, TaskRecord, TaskStatus};
use crate::ports::{Policy, PolicyContext, ReadyTask};

/// Failures after which a task is no longer re-admitted.
pub const DEFAULT_MAX_FAILURES: u32 = 3;

pub struct FifoPolicy {
    ctx: PolicyContext,
    max_failures: u32,
    queue: VecDeque<TaskRecord>,
    /// Waiting for re-admission on the next round.
    retry: Vec<TaskRecord>,
    /// Out of retries.
    abandoned: Vec<TaskRecord>,
}

impl FifoPolicy {
    pub fn new(ctx: PolicyContext, max_failures: u32) -> Self {
        Self {
            ctx,
            max_failures,
            queue: VecDeque::new(),
            retry: Vec::new(),
            abandoned: Vec::new(),
        }
    }

    fn readmit_failed(&mut self) {
        if self.retry.is_empty() {
            return;
        }
        let now = self.ctx.clock.now();
        for mut task in self.retry.drain(..) {
            task.mark_queued(now);
            debug!(task_id = %task.task_id(), failures = task.failures(), "task re-admitted");
            self.queue.push_back(task);
        }
    }

    fn all(&self) -> impl Iterator<Item = &TaskRecord> {
        self.queue
            .iter()
            .chain(self.retry.iter())
            .chain(self.abandoned.iter())
    }
}

#[async_trait]
impl Policy for FifoPolicy {
    fn insert(&mut self, tasks: Vec<TaskRecord>) {
        self.queue.extend(tasks);
    }

    async fn get_ready_tasks(&mut self) -> Vec<ReadyTask> {
        self.readmit_failed();
        if self.queue.is_empty() {
            return Vec::new();
        }

        let nodes = self
            .ctx
            .resource_manager
            .acquire_nodes(self.queue.len())
            .await;
        let mut ready = Vec::with_capacity(nodes.len());
        for node in nodes {
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            ready.push(ReadyTask { task, node });
        }
        ready
    }

    fn finished(&mut self, task: &TaskRecord) {
        debug!(task_id = %task.task_id(), status = %task.status(), "task left the running set");
    }

    fn failed(&mut self, task: TaskRecord) {
        if task.failures() >= self.max_failures {
            warn!(
                task_id = %task.task_id(),
                failures = task.failures(),
                max_failures = self.max_failures,
                "task failed too often; not re-admitting"
            );
            self.abandoned.push(task);
        } else {
            self.retry.push(task);
        }
    }

    fn remove_task(&mut self, task_id: &TaskId) -> Option<TaskRecord> {
        if let Some(pos) = self.queue.iter().position(|t| t.task_id() == task_id) {
            return self.queue.remove(pos);
        }
        if let Some(pos) = self.retry.iter().position(|t| t.task_id() == task_id) {
            return Some(self.retry.remove(pos));
        }
        let pos = self.abandoned.iter().position(|t| t.task_id() == task_id)?;
        Some(self.abandoned.remove(pos))
    }

    fn get_task(&self, task_id: &TaskId) -> Option<&TaskRecord> {
        self.all().find(|t| t.task_id() == task_id)
    }

    fn flush(&mut self) -> Vec<TaskRecord> {
        let mut flushed: Vec<TaskRecord> = self.queue.drain(..).collect();
        flushed.append(&mut self.retry);
        flushed.append(&mut self.abandoned);
        flushed
    }

    fn queued_ids(&self) -> Vec<TaskId> {
        self.all()
            .filter(|t| t.status() == TaskStatus::Queued)
            .map(|t| t.task_id().clone())
            .collect()
    }

    fn failed_ids(&self) -> Vec<TaskId> {
        self.all()
            .filter(|t| t.status() == TaskStatus::Failed)
            .map(|t| t.task_id().clone())
            .collect()
    }

    fn info_all(&self) -> Vec<TaskInfo> {
        self.all().map(TaskRecord::info).collect()
    }
}
