//! Outcome model: what a caller receives from `get_result`.
//!
//! The scheduler never interprets the value an executor produced. It only
//! records whether the run produced a value or an error message, and which
//! terminal status the result was delivered with.

use serde::{Deserialize, Serialize};

use super::{TaskId, TaskStatus};

/// The concrete outcome behind a resolved result handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The executor returned a value.
    Success(serde_json::Value),

    /// The run failed, was killed, or the request was rejected.
    Error(String),
}

impl TaskOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        TaskOutcome::Error(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            TaskOutcome::Error(msg) => Some(msg),
            TaskOutcome::Success(_) => None,
        }
    }
}

/// The reply to `get_result`.
///
/// `status` is one of FINISHED / KILLED / ERROR. ERROR is only ever produced
/// by the admission filter and never reflects a task's stored status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub outcome: TaskOutcome,
}

impl TaskResult {
    pub fn new(task_id: TaskId, status: TaskStatus, outcome: TaskOutcome) -> Self {
        Self {
            task_id,
            status,
            outcome,
        }
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            TaskOutcome::Success(v) => Some(v),
            TaskOutcome::Error(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_is_tagged_enum() {
        let o = TaskOutcome::Success(serde_json::json!({"sum": 3}));
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["kind"], "success");
        assert_eq!(v["value"]["sum"], 3);
    }

    #[test]
    fn error_outcome_exposes_message() {
        let o = TaskOutcome::error("boom");
        assert!(!o.is_success());
        assert_eq!(o.error_message(), Some("boom"));
    }

    #[test]
    fn result_value_only_for_success() {
        let ok = TaskResult::new(
            TaskId::new("t1"),
            TaskStatus::Finished,
            TaskOutcome::Success(serde_json::json!(1)),
        );
        assert_eq!(ok.value(), Some(&serde_json::json!(1)));

        let err = TaskResult::new(
            TaskId::new("t1"),
            TaskStatus::Error,
            TaskOutcome::error("nope"),
        );
        assert!(err.value().is_none());
    }
}
