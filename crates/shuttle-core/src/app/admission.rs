//! Admission - リクエストを今サービスしてよいかを決める純粋関数
//!
//! # ルール（上から順に評価）
//! 1. `get_result(task_id, user)`
//!    - 未知のタスク かつ シャットダウン中 → 受理（ERROR を合成）
//!    - 既知のタスクだが user が所有者と違う → 受理（ERROR を合成）
//!    - finished set にある → 受理（本物の結果）
//!    - QUEUED / FAILED かつ シャットダウン中 → 受理（ERROR を合成）
//!    - それ以外 → 拒否（まだ結果がない。リクエストはメールボックスに残る）
//! 2. `terminate_scheduler` → シャットダウン要求済みのときだけ受理
//! 3. その他 → 常に受理
//!
//! クライアントが存在しない結果を観測したり、shutdown 前に終了させたり
//! できないことを、このフィルタが保証する。

use crate::domain::{TaskId, TaskStatus};

pub const MSG_UNKNOWN_TASK: &str =
    "task does not exist in the scheduler, was never queued, or was already collected";
pub const MSG_WRONG_USER: &str = "user name is not correct";
pub const MSG_QUEUED_AT_SHUTDOWN: &str = "scheduler is shutting down, task will not be scheduled";
pub const MSG_FAILED_AT_SHUTDOWN: &str =
    "task execution failed and the scheduler is shutting down, task will not be scheduled";

/// Argument view of a pending request, as far as admission cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRequest<'a> {
    GetResult { task_id: &'a TaskId, user: &'a str },
    TerminateScheduler,
    Other,
}

/// What admission needs to know about a task the scheduler holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskView<'a> {
    pub owner: &'a str,
    pub status: TaskStatus,
    /// Sits in the finished set (result available).
    pub finished: bool,
}

/// Read-only view of the scheduler state.
pub trait AdmissionView {
    fn is_shutting_down(&self) -> bool;
    fn lookup(&self, task_id: &TaskId) -> Option<TaskView<'_>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Accept, but answer with a synthetic ERROR carrying this message.
    Synthesize(&'static str),
    Reject,
}

impl Verdict {
    pub fn admits(self) -> bool {
        !matches!(self, Verdict::Reject)
    }
}

pub fn accept(request: AdmissionRequest<'_>, state: &impl AdmissionView) -> Verdict {
    match request {
        AdmissionRequest::GetResult { task_id, user } => accept_get_result(task_id, user, state),
        AdmissionRequest::TerminateScheduler => {
            if state.is_shutting_down() {
                Verdict::Accept
            } else {
                Verdict::Reject
            }
        }
        AdmissionRequest::Other => Verdict::Accept,
    }
}

fn accept_get_result(task_id: &TaskId, user: &str, state: &impl AdmissionView) -> Verdict {
    let shutting_down = state.is_shutting_down();
    let Some(task) = state.lookup(task_id) else {
        return if shutting_down {
            Verdict::Synthesize(MSG_UNKNOWN_TASK)
        } else {
            Verdict::Reject
        };
    };

    if task.owner != user {
        return Verdict::Synthesize(MSG_WRONG_USER);
    }
    if task.finished {
        return Verdict::Accept;
    }
    match (task.status, shutting_down) {
        (TaskStatus::Queued, true) => Verdict::Synthesize(MSG_QUEUED_AT_SHUTDOWN),
        (TaskStatus::Failed, true) => Verdict::Synthesize(MSG_FAILED_AT_SHUTDOWN),
        _ => Verdict::Reject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    struct Fake {
        shutting_down: bool,
        tasks: HashMap<TaskId, (String, TaskStatus, bool)>,
    }

    impl Fake {
        fn new(shutting_down: bool) -> Self {
            Self {
                shutting_down,
                tasks: HashMap::new(),
            }
        }

        fn with(mut self, id: &str, owner: &str, status: TaskStatus, finished: bool) -> Self {
            self.tasks
                .insert(TaskId::new(id), (owner.to_string(), status, finished));
            self
        }
    }

    impl AdmissionView for Fake {
        fn is_shutting_down(&self) -> bool {
            self.shutting_down
        }

        fn lookup(&self, task_id: &TaskId) -> Option<TaskView<'_>> {
            self.tasks.get(task_id).map(|(owner, status, finished)| TaskView {
                owner,
                status: *status,
                finished: *finished,
            })
        }
    }

    fn get_result(state: &Fake, id: &str, user: &str) -> Verdict {
        let task_id = TaskId::new(id);
        accept(
            AdmissionRequest::GetResult {
                task_id: &task_id,
                user,
            },
            state,
        )
    }

    #[rstest]
    #[case::running_not_down(TaskStatus::Running, false, false, Verdict::Reject)]
    #[case::queued_not_down(TaskStatus::Queued, false, false, Verdict::Reject)]
    #[case::failed_not_down(TaskStatus::Failed, false, false, Verdict::Reject)]
    #[case::running_down(TaskStatus::Running, true, false, Verdict::Reject)]
    #[case::queued_down(TaskStatus::Queued, true, false, Verdict::Synthesize(MSG_QUEUED_AT_SHUTDOWN))]
    #[case::failed_down(TaskStatus::Failed, true, false, Verdict::Synthesize(MSG_FAILED_AT_SHUTDOWN))]
    #[case::finished(TaskStatus::Finished, false, true, Verdict::Accept)]
    #[case::killed(TaskStatus::Killed, false, true, Verdict::Accept)]
    #[case::finished_down(TaskStatus::Finished, true, true, Verdict::Accept)]
    fn owner_get_result(
        #[case] status: TaskStatus,
        #[case] shutting_down: bool,
        #[case] finished: bool,
        #[case] expected: Verdict,
    ) {
        let state = Fake::new(shutting_down).with("t1", "alice", status, finished);
        assert_eq!(get_result(&state, "t1", "alice"), expected);
    }

    #[rstest]
    #[case::queued(TaskStatus::Queued, false)]
    #[case::running(TaskStatus::Running, false)]
    #[case::finished(TaskStatus::Finished, true)]
    #[case::killed(TaskStatus::Killed, true)]
    fn wrong_user_always_gets_an_error(#[case] status: TaskStatus, #[case] finished: bool) {
        for shutting_down in [false, true] {
            let state = Fake::new(shutting_down).with("t1", "alice", status, finished);
            assert_eq!(
                get_result(&state, "t1", "bob"),
                Verdict::Synthesize(MSG_WRONG_USER)
            );
        }
    }

    #[test]
    fn unknown_task_waits_until_shutdown() {
        assert_eq!(get_result(&Fake::new(false), "ghost", "alice"), Verdict::Reject);
        assert_eq!(
            get_result(&Fake::new(true), "ghost", "alice"),
            Verdict::Synthesize(MSG_UNKNOWN_TASK)
        );
    }

    #[test]
    fn terminate_requires_shutdown() {
        assert_eq!(
            accept(AdmissionRequest::TerminateScheduler, &Fake::new(false)),
            Verdict::Reject
        );
        assert_eq!(
            accept(AdmissionRequest::TerminateScheduler, &Fake::new(true)),
            Verdict::Accept
        );
    }

    #[test]
    fn everything_else_is_always_admitted() {
        assert!(accept(AdmissionRequest::Other, &Fake::new(false)).admits());
        assert!(accept(AdmissionRequest::Other, &Fake::new(true)).admits());
    }
}
