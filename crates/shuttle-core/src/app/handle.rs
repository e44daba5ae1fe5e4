//! SchedulerHandle - クライアント側の API
//!
//! すべての呼び出しはリクエストを mailbox に積み、oneshot で返事を待つ
//! （呼び出し側から見れば同期 RPC）。`get_result` は admission を通るまで
//! 返ってこないので、待ち時間を区切りたい呼び出し側は
//! `tokio::time::timeout` で包む。
//!
//! スケジューラが終了したあとは、どの呼び出しも
//! [`ClientError::SchedulerTerminated`] を返す。

use tokio::sync::{mpsc, oneshot};

use super::mailbox::{IdList, Request};
use crate::domain::errors::ClientError;
use crate::domain::{NewTask, TaskId, TaskInfo, TaskResult};

#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Request>,
}

impl SchedulerHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Request>) -> Self {
        Self { tx }
    }

    /// The scheduler actor has exited.
    pub fn is_terminated(&self) -> bool {
        self.tx.is_closed()
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| ClientError::SchedulerTerminated)?;
        rx.await.map_err(|_| ClientError::SchedulerTerminated)
    }

    pub async fn submit(&self, tasks: Vec<NewTask>) -> Result<(), ClientError> {
        self.call(|reply| Request::Submit { tasks, reply }).await
    }

    pub async fn is_finished(&self, task_id: impl Into<TaskId>) -> Result<bool, ClientError> {
        let task_id = task_id.into();
        self.call(|reply| Request::IsFinished { task_id, reply })
            .await
    }

    /// Waits until the result may be delivered (see the admission rules).
    pub async fn get_result(
        &self,
        task_id: impl Into<TaskId>,
        user: impl Into<String>,
    ) -> Result<TaskResult, ClientError> {
        let task_id = task_id.into();
        let user = user.into();
        self.call(|reply| Request::GetResult {
            task_id,
            user,
            reply,
        })
        .await
    }

    /// Returns `true` if the task was queued or running and is now KILLED.
    pub async fn del(
        &self,
        task_id: impl Into<TaskId>,
        user: impl Into<String>,
    ) -> Result<bool, ClientError> {
        let task_id = task_id.into();
        let user = user.into();
        self.call(|reply| Request::Del {
            task_id,
            user,
            reply,
        })
        .await
    }

    /// `immediate = true` kills every running task; `false` lets them finish.
    pub async fn shutdown(&self, immediate: bool) -> Result<(), ClientError> {
        self.call(|reply| Request::Shutdown { immediate, reply })
            .await
    }

    /// Resolves once the scheduler has drained after a shutdown.
    pub async fn terminate_scheduler(&self) -> Result<bool, ClientError> {
        self.call(|reply| Request::TerminateScheduler { reply })
            .await
    }

    pub async fn info(&self, task_id: impl Into<TaskId>) -> Result<TaskInfo, ClientError> {
        let task_id = task_id.into();
        self.call(|reply| Request::Info { task_id, reply }).await
    }

    pub async fn info_all(&self) -> Result<Vec<TaskInfo>, ClientError> {
        self.call(|reply| Request::InfoAll { reply }).await
    }

    pub async fn is_in_queue(&self, task_id: impl Into<TaskId>) -> Result<bool, ClientError> {
        let task_id = task_id.into();
        self.call(|reply| Request::IsInQueue { task_id, reply })
            .await
    }

    pub async fn is_running(&self, task_id: impl Into<TaskId>) -> Result<bool, ClientError> {
        let task_id = task_id.into();
        self.call(|reply| Request::IsRunning { task_id, reply })
            .await
    }

    pub async fn queued_ids(&self) -> Result<Vec<TaskId>, ClientError> {
        self.ids(IdList::Queued).await
    }

    pub async fn failed_ids(&self) -> Result<Vec<TaskId>, ClientError> {
        self.ids(IdList::Failed).await
    }

    pub async fn running_ids(&self) -> Result<Vec<TaskId>, ClientError> {
        self.ids(IdList::Running).await
    }

    pub async fn killed_ids(&self) -> Result<Vec<TaskId>, ClientError> {
        self.ids(IdList::Killed).await
    }

    pub async fn finished_ids(&self) -> Result<Vec<TaskId>, ClientError> {
        self.ids(IdList::Finished).await
    }

    async fn ids(&self, list: IdList) -> Result<Vec<TaskId>, ClientError> {
        self.call(|reply| Request::Ids { list, reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calls_fail_once_the_actor_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SchedulerHandle::new(tx);
        drop(rx);

        assert!(handle.is_terminated());
        assert_eq!(
            handle.is_finished("t1").await,
            Err(ClientError::SchedulerTerminated)
        );
    }

    #[tokio::test]
    async fn dropped_reply_maps_to_terminated() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = SchedulerHandle::new(tx);
        let actor = tokio::spawn(async move {
            // receive and drop, the way a dying scheduler discards its mailbox
            let _ = rx.recv().await;
        });

        assert_eq!(
            handle.terminate_scheduler().await,
            Err(ClientError::SchedulerTerminated)
        );
        actor.await.unwrap();
    }
}
