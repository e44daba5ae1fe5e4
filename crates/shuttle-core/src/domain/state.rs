//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// TaskStatus はタスクの状態を表現
///
/// # 状態遷移
/// - New -> Queued (submit)
/// - Queued -> Running (launch 成功)
/// - Queued -> Failed (launch 失敗、policy に返却)
/// - Running -> Finished (結果が確定)
/// - Running -> Failed (liveness probe 失敗、policy に返却)
/// - Failed -> Queued (policy が再投入を判断した場合のみ)
/// - Queued | Running -> Killed (del / hard shutdown)
///
/// Error は admission 時に合成される結果専用で、タスク本体の状態にはならない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    New,
    Queued,
    Running,
    Finished,
    Failed,
    Killed,
    Error,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Killed | TaskStatus::Error
        )
    }

    /// Is a task in this state owned by the policy?
    pub fn is_pending(self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (New, Queued)
                | (Queued, Running)
                | (Queued, Failed)
                | (Queued, Killed)
                | (Running, Finished)
                | (Running, Failed)
                | (Running, Killed)
                | (Failed, Queued)
                | (Failed, Killed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::New => "NEW",
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Finished => "FINISHED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Killed => "KILLED",
            TaskStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}
