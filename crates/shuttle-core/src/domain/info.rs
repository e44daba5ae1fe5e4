//! Info - タスク状態の読み取り専用スナップショット
//!
//! status / info_all などのクエリで返す。ライブビューではなくコピー。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TaskId, TaskStatus};

/// Placeholder used for owner / executor when nothing is known.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub owner: String,
    /// URL of the node running the task, or "unknown".
    pub executor_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub queued_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failures: u32,
}

impl TaskInfo {
    /// Snapshot for an id the scheduler does not hold.
    pub fn unknown(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: TaskStatus::New,
            owner: UNKNOWN.to_string(),
            executor_url: UNKNOWN.to_string(),
            created_at: None,
            queued_at: None,
            scheduled_at: None,
            finished_at: None,
            failures: 0,
        }
    }
}
