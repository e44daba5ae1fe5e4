//! Mailbox - 選択的受信つきのリクエストキュー
//!
//! スケジューラ actor へのリクエストは unbounded mpsc で届く。
//! admission で拒否されたリクエストは `pending` に到着順のまま残り、
//! 次の評価で再び候補になる（メールボックス全体がブロックされることはない）。
//!
//! 呼び出し側が待つのをやめた問い合わせ（`get_result` や info 系）は
//! 取り出す前に捨てる。副作用のあるリクエスト（submit / del / shutdown /
//! terminate）は返事を待つ相手がいなくても残す。

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::admission::AdmissionRequest;
use crate::domain::{NewTask, TaskId, TaskInfo, TaskResult};

/// Which id list an `Ids` query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdList {
    Queued,
    Failed,
    Running,
    Killed,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Submit,
    IsFinished,
    GetResult,
    Del,
    Shutdown,
    TerminateScheduler,
    Query,
}

/// One message in the scheduler mailbox. Each carries its reply channel.
#[derive(Debug)]
pub enum Request {
    Submit {
        tasks: Vec<NewTask>,
        reply: oneshot::Sender<()>,
    },
    IsFinished {
        task_id: TaskId,
        reply: oneshot::Sender<bool>,
    },
    GetResult {
        task_id: TaskId,
        user: String,
        reply: oneshot::Sender<TaskResult>,
    },
    Del {
        task_id: TaskId,
        user: String,
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        immediate: bool,
        reply: oneshot::Sender<()>,
    },
    TerminateScheduler {
        reply: oneshot::Sender<bool>,
    },
    Info {
        task_id: TaskId,
        reply: oneshot::Sender<TaskInfo>,
    },
    InfoAll {
        reply: oneshot::Sender<Vec<TaskInfo>>,
    },
    Ids {
        list: IdList,
        reply: oneshot::Sender<Vec<TaskId>>,
    },
    IsInQueue {
        task_id: TaskId,
        reply: oneshot::Sender<bool>,
    },
    IsRunning {
        task_id: TaskId,
        reply: oneshot::Sender<bool>,
    },
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Submit { .. } => RequestKind::Submit,
            Request::IsFinished { .. } => RequestKind::IsFinished,
            Request::GetResult { .. } => RequestKind::GetResult,
            Request::Del { .. } => RequestKind::Del,
            Request::Shutdown { .. } => RequestKind::Shutdown,
            Request::TerminateScheduler { .. } => RequestKind::TerminateScheduler,
            Request::Info { .. }
            | Request::InfoAll { .. }
            | Request::Ids { .. }
            | Request::IsInQueue { .. }
            | Request::IsRunning { .. } => RequestKind::Query,
        }
    }

    /// Nobody is waiting for the reply and serving it would change nothing
    /// but the reply itself.
    pub fn is_abandoned(&self) -> bool {
        match self {
            Request::IsFinished { reply, .. }
            | Request::IsInQueue { reply, .. }
            | Request::IsRunning { reply, .. } => reply.is_closed(),
            Request::GetResult { reply, .. } => reply.is_closed(),
            Request::Info { reply, .. } => reply.is_closed(),
            Request::InfoAll { reply } => reply.is_closed(),
            Request::Ids { reply, .. } => reply.is_closed(),
            Request::Submit { .. }
            | Request::Del { .. }
            | Request::Shutdown { .. }
            | Request::TerminateScheduler { .. } => false,
        }
    }

    pub fn as_admission(&self) -> AdmissionRequest<'_> {
        match self {
            Request::GetResult { task_id, user, .. } => AdmissionRequest::GetResult { task_id, user },
            Request::TerminateScheduler { .. } => AdmissionRequest::TerminateScheduler,
            _ => AdmissionRequest::Other,
        }
    }
}

pub struct Mailbox {
    rx: mpsc::UnboundedReceiver<Request>,
    pending: VecDeque<Request>,
    closed: bool,
}

impl Mailbox {
    pub fn new(rx: mpsc::UnboundedReceiver<Request>) -> Self {
        Self {
            rx,
            pending: VecDeque::new(),
            closed: false,
        }
    }

    /// Every sender is gone and nothing more can arrive.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Move everything that already arrived into the pending buffer and
    /// drop what nobody waits for any more.
    fn collect(&mut self) {
        self.pending.retain(|r| !r.is_abandoned());
        loop {
            match self.rx.try_recv() {
                Ok(request) => self.buffer(request),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    return;
                }
            }
        }
    }

    fn buffer(&mut self, request: Request) {
        if request.is_abandoned() {
            debug!(kind = ?request.kind(), "dropping a request nobody waits for");
            return;
        }
        self.pending.push_back(request);
    }

    /// Remove every pending request of `kind`, oldest first. Never waits.
    pub fn take_all(&mut self, kind: RequestKind) -> Vec<Request> {
        self.collect();
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.pending.len());
        for request in self.pending.drain(..) {
            if request.kind() == kind {
                taken.push(request);
            } else {
                kept.push_back(request);
            }
        }
        self.pending = kept;
        taken
    }

    /// Remove the oldest pending request matching `pred`. Never waits.
    pub fn take_first<P>(&mut self, mut pred: P) -> Option<Request>
    where
        P: FnMut(&Request) -> bool,
    {
        self.collect();
        let pos = self.pending.iter().position(|r| pred(r))?;
        self.pending.remove(pos)
    }

    /// Wait up to `timeout` for the oldest request matching `pred`.
    ///
    /// Requests already pending are checked first. Non-matching arrivals are
    /// buffered in order. Callers must not change the state `pred` reads
    /// while waiting, so earlier rejections stay valid.
    pub async fn wait_for<P>(&mut self, timeout: Duration, mut pred: P) -> Option<Request>
    where
        P: FnMut(&Request) -> bool,
    {
        if let Some(request) = self.take_first(&mut pred) {
            return Some(request);
        }
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.closed {
                tokio::time::sleep_until(deadline).await;
                return None;
            }
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(request)) if request.is_abandoned() => {}
                Ok(Some(request)) if pred(&request) => return Some(request),
                Ok(Some(request)) => self.pending.push_back(request),
                Ok(None) => self.closed = true,
                Err(_) => return None,
            }
        }
    }

    /// Wait up to `timeout` for any new arrival and buffer it.
    pub async fn wait_arrival(&mut self, timeout: Duration) {
        self.collect();
        if self.closed {
            tokio::time::sleep(timeout).await;
            return;
        }
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(request)) => self.buffer(request),
            Ok(None) => self.closed = true,
            Err(_) => {}
        }
    }

    /// Put a request taken too early back at the head of the buffer.
    pub fn defer(&mut self, request: Request) {
        self.pending.push_front(request);
    }

    /// Nothing pending except terminate requests (or nothing at all).
    pub fn only_terminate_left(&mut self) -> bool {
        self.collect();
        self.pending
            .iter()
            .all(|r| r.kind() == RequestKind::TerminateScheduler)
    }
}
