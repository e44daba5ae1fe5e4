//! Policy port - キューイングと配置の戦略
//!
//! # 設計原則
//! - policy が保持している間、タスク（TaskRecord）の所有者は policy
//! - `get_ready_tasks` で返したタスクの所有権はスケジューラに移る
//! - FAILED タスクを再投入するかどうかは policy だけが決める

use std::sync::Arc;

use async_trait::async_trait;

use super::clock::Clock;
use super::executor::BoundNode;
use super::resource_manager::ResourceManager;
use crate::domain::{TaskId, TaskInfo, TaskRecord};

/// A task handed out for launching, already bound to a node.
#[derive(Debug)]
pub struct ReadyTask {
    pub task: TaskRecord,
    pub node: BoundNode,
}

#[async_trait]
pub trait Policy: Send + Sync {
    /// Take ownership of newly submitted (QUEUED) tasks.
    fn insert(&mut self, tasks: Vec<TaskRecord>);

    /// Tasks to launch now, in launch order.
    async fn get_ready_tasks(&mut self) -> Vec<ReadyTask>;

    /// Notification that a task left RUNNING for good.
    fn finished(&mut self, task: &TaskRecord);

    /// A launch or liveness failure; the task comes back as FAILED.
    fn failed(&mut self, task: TaskRecord);

    fn remove_task(&mut self, task_id: &TaskId) -> Option<TaskRecord>;

    fn get_task(&self, task_id: &TaskId) -> Option<&TaskRecord>;

    /// Drop everything held and return it.
    fn flush(&mut self) -> Vec<TaskRecord>;

    fn queued_ids(&self) -> Vec<TaskId>;

    fn failed_ids(&self) -> Vec<TaskId>;

    /// Snapshots of every queued and failed task.
    fn info_all(&self) -> Vec<TaskInfo>;
}

/// What a policy factory receives at build time.
#[derive(Clone)]
pub struct PolicyContext {
    pub resource_manager: Arc<dyn ResourceManager>,
    pub clock: Arc<dyn Clock>,
}
