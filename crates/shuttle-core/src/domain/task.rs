//! Task record: identity + lifecycle state for one unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::info::{TaskInfo, UNKNOWN};
use super::{TaskId, TaskOutcome, TaskResult, TaskStatus};
use crate::ports::executor::{BoundNode, ResultHandle};

/// What a caller submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub task_id: TaskId,
    pub owner: String,
    pub payload: serde_json::Value,
}

impl NewTask {
    pub fn new(
        task_id: impl Into<TaskId>,
        owner: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            owner: owner.into(),
            payload,
        }
    }
}

/// The executor binding of a RUNNING task.
#[derive(Debug)]
pub struct Execution {
    pub node: BoundNode,
    pub handle: ResultHandle,
}

/// Lifecycle record of a task.
///
/// Design:
/// - All status changes go through the `mark_*` methods so the state machine
///   in [`TaskStatus::can_transition_to`] holds.
/// - `execution` is `Some` iff the task is RUNNING.
/// - Whoever holds the record by value owns the task (policy, running set or
///   finished set).
#[derive(Debug)]
pub struct TaskRecord {
    task_id: TaskId,
    owner: String,
    status: TaskStatus,
    payload: serde_json::Value,
    execution: Option<Execution>,
    outcome: Option<TaskOutcome>,
    failures: u32,

    created_at: DateTime<Utc>,
    queued_at: Option<DateTime<Utc>>,
    scheduled_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(task: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            task_id: task.task_id,
            owner: task.owner,
            status: TaskStatus::New,
            payload: task.payload,
            execution: None,
            outcome: None,
            failures: 0,
            created_at: now,
            queued_at: None,
            scheduled_at: None,
            finished_at: None,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn node(&self) -> Option<&BoundNode> {
        self.execution.as_ref().map(|e| &e.node)
    }

    pub fn outcome(&self) -> Option<&TaskOutcome> {
        self.outcome.as_ref()
    }

    fn transition(&mut self, next: TaskStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal transition {} -> {} for task {}",
            self.status,
            next,
            self.task_id
        );
        self.status = next;
    }

    /// NEW -> QUEUED on submit, or FAILED -> QUEUED when a policy re-admits it.
    /// The enqueue timestamp is only set the first time.
    pub fn mark_queued(&mut self, now: DateTime<Utc>) {
        self.transition(TaskStatus::Queued);
        if self.queued_at.is_none() {
            self.queued_at = Some(now);
        }
    }

    /// QUEUED -> RUNNING after a successful launch.
    pub fn mark_running(&mut self, node: BoundNode, handle: ResultHandle, now: DateTime<Utc>) {
        self.transition(TaskStatus::Running);
        self.execution = Some(Execution { node, handle });
        self.scheduled_at = Some(now);
    }

    /// QUEUED -> FAILED when probe/start threw during launch.
    pub fn mark_launch_failed(&mut self) {
        self.transition(TaskStatus::Failed);
        self.failures += 1;
    }

    /// RUNNING -> FAILED when the liveness probe failed.
    /// Returns the node so it can be handed back to the resource manager.
    pub fn mark_probe_failed(&mut self) -> Option<BoundNode> {
        self.transition(TaskStatus::Failed);
        self.failures += 1;
        self.execution.take().map(|e| e.node)
    }

    /// Is the deferred result of a RUNNING task still outstanding?
    pub fn is_result_pending(&mut self) -> bool {
        match self.execution.as_mut() {
            Some(execution) => execution.handle.is_pending(),
            None => false,
        }
    }

    /// RUNNING -> FINISHED if the handle resolved. Returns the freed node.
    pub fn try_finish(&mut self, now: DateTime<Utc>) -> Option<BoundNode> {
        if self.status != TaskStatus::Running || self.is_result_pending() {
            return None;
        }
        let execution = self.execution.take()?;
        self.outcome = execution.handle.into_outcome();
        self.transition(TaskStatus::Finished);
        self.finished_at = Some(now);
        Some(execution.node)
    }

    /// QUEUED / FAILED / RUNNING -> KILLED. Returns the node if it was running.
    pub fn mark_killed(&mut self, message: &str, now: DateTime<Utc>) -> Option<BoundNode> {
        self.transition(TaskStatus::Killed);
        self.outcome = Some(TaskOutcome::error(message));
        self.finished_at = Some(now);
        self.execution.take().map(|e| e.node)
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            task_id: self.task_id.clone(),
            status: self.status,
            owner: self.owner.clone(),
            executor_url: self
                .node()
                .map(|n| n.node.url.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            created_at: Some(self.created_at),
            queued_at: self.queued_at,
            scheduled_at: self.scheduled_at,
            finished_at: self.finished_at,
            failures: self.failures,
        }
    }

    /// Consumes a finished or killed record into the caller-facing result.
    pub fn into_result(self) -> TaskResult {
        let outcome = self
            .outcome
            .unwrap_or_else(|| TaskOutcome::error("task has no recorded outcome"));
        TaskResult::new(self.task_id, self.status, outcome)
    }
}
