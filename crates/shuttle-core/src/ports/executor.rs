//! Executor port - リーズされたノード上でタスクを実行するリモートハンドル
//!
//! # 設計原則
//! - `start` は実行を開始するだけで、結果は [`ResultHandle`] で後から受け取る
//! - `ping` は軽量なヘルスチェック（失敗 = ノード不健全）
//! - `kill` はプロセスごと落とすので、成功時でも通信エラーになるのが普通

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::domain::errors::ExecutorError;
use crate::domain::{NodeId, TaskOutcome};

/// Remote handle able to start, probe and kill a task's execution.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Lightweight health check.
    async fn ping(&self) -> Result<(), ExecutorError>;

    /// Start running `payload`; returns immediately with a deferred handle.
    async fn start(&self, payload: serde_json::Value) -> Result<ResultHandle, ExecutorError>;

    /// Best-effort forced termination.
    async fn kill(&self) -> Result<(), ExecutorError>;
}

/// A node as known to the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub id: NodeId,
    pub url: String,
}

impl NodeHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: NodeId::generate(),
            url: url.into(),
        }
    }
}

/// A leased node together with the executor living on it.
#[derive(Clone)]
pub struct BoundNode {
    pub node: NodeHandle,
    pub executor: Arc<dyn Executor>,
}

impl BoundNode {
    pub fn new(node: NodeHandle, executor: Arc<dyn Executor>) -> Self {
        Self { node, executor }
    }
}

impl fmt::Debug for BoundNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundNode")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// Creates a connected sender / deferred handle pair.
pub fn result_channel() -> (ResultSender, ResultHandle) {
    let (tx, rx) = oneshot::channel();
    (
        ResultSender { tx },
        ResultHandle {
            rx: Some(rx),
            resolved: None,
        },
    )
}

/// Executor side of a deferred result.
#[derive(Debug)]
pub struct ResultSender {
    tx: oneshot::Sender<TaskOutcome>,
}

impl ResultSender {
    /// Returns false when the scheduler side has already gone away.
    pub fn resolve(self, outcome: TaskOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

/// Deferred result handle.
///
/// Polled without blocking; once resolved it stays resolved. A sender dropped
/// without resolving counts as a resolved error so a crashed executor can't
/// leave a task RUNNING forever.
#[derive(Debug)]
pub struct ResultHandle {
    rx: Option<oneshot::Receiver<TaskOutcome>>,
    resolved: Option<TaskOutcome>,
}

impl ResultHandle {
    /// A handle that is already resolved.
    pub fn ready(outcome: TaskOutcome) -> Self {
        Self {
            rx: None,
            resolved: Some(outcome),
        }
    }

    pub fn is_pending(&mut self) -> bool {
        self.poll();
        self.resolved.is_none()
    }

    /// Consumes the handle. `None` while still pending.
    pub fn into_outcome(mut self) -> Option<TaskOutcome> {
        self.poll();
        self.resolved
    }

    fn poll(&mut self) {
        if self.resolved.is_some() {
            return;
        }
        let Some(rx) = self.rx.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(outcome) => self.resolved = Some(outcome),
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => {
                self.resolved = Some(TaskOutcome::error(
                    "executor went away without producing a result",
                ));
            }
        }
        self.rx = None;
    }
}
