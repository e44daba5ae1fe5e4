//! FinishedSet - 結果の回収を待っているタスク
//!
//! FINISHED / KILLED のタスク本体と、admission が合成した ERROR エントリを
//! 到着順に保持する。所有者が `get_result` で回収した時点で取り除かれる。

use crate::domain::{TaskId, TaskInfo, TaskOutcome, TaskRecord, TaskResult, TaskStatus};

#[derive(Debug)]
enum Entry {
    Task(TaskRecord),
    Synthetic {
        task_id: TaskId,
        user: String,
        message: &'static str,
    },
}

impl Entry {
    fn task_id(&self) -> &TaskId {
        match self {
            Entry::Task(task) => task.task_id(),
            Entry::Synthetic { task_id, .. } => task_id,
        }
    }

    fn user(&self) -> &str {
        match self {
            Entry::Task(task) => task.owner(),
            Entry::Synthetic { user, .. } => user,
        }
    }

    fn into_result(self) -> TaskResult {
        match self {
            Entry::Task(task) => task.into_result(),
            Entry::Synthetic {
                task_id, message, ..
            } => TaskResult::new(task_id, TaskStatus::Error, TaskOutcome::error(message)),
        }
    }
}

#[derive(Debug, Default)]
pub struct FinishedSet {
    entries: Vec<Entry>,
}

impl FinishedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: TaskRecord) {
        self.entries.push(Entry::Task(task));
    }

    /// Record an ERROR outcome for `(task_id, user)` without touching any real task.
    pub fn push_synthetic(&mut self, task_id: TaskId, user: String, message: &'static str) {
        self.entries.push(Entry::Synthetic {
            task_id,
            user,
            message,
        });
    }

    /// Any outcome (real or synthetic) waiting for this id.
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.entries.iter().any(|e| e.task_id() == task_id)
    }

    /// The real task record with this id, if finished or killed.
    pub fn get_task(&self, task_id: &TaskId) -> Option<&TaskRecord> {
        self.entries.iter().find_map(|e| match e {
            Entry::Task(task) if task.task_id() == task_id => Some(task),
            _ => None,
        })
    }

    /// Remove and return the oldest outcome addressed to `(task_id, user)`.
    pub fn take(&mut self, task_id: &TaskId, user: &str) -> Option<TaskResult> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.task_id() == task_id && e.user() == user)?;
        Some(self.entries.remove(pos).into_result())
    }

    pub fn ids_with_status(&self, status: TaskStatus) -> Vec<TaskId> {
        self.tasks()
            .filter(|t| t.status() == status)
            .map(|t| t.task_id().clone())
            .collect()
    }

    pub fn infos(&self) -> Vec<TaskInfo> {
        self.tasks().map(TaskRecord::info).collect()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    fn tasks(&self) -> impl Iterator<Item = &TaskRecord> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Task(task) => Some(task),
            Entry::Synthetic { .. } => None,
        })
    }
}
