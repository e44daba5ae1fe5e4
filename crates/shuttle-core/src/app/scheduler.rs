//! Scheduler - すべての状態を所有する actor
//!
//! # フロー（シャットダウン前の 1 イテレーション）
//! 1. 溜まっている submit / is_finished をすべて処理（待たない）
//! 2. schedule: policy から ready なタスクを受け取り、ping → start で launch
//! 3. manage running: 結果が届いた RUNNING タスクを FINISHED にしてノードを返却
//! 4. liveness probe（間隔が空いていれば）
//! 5. submit / is_finished をもう一度処理
//! 6. admission を通る一番古いリクエストを `scheduler_timeout` まで待って処理
//!
//! シャットダウン後は drain ループに切り替わる。launch はせず、3・4 を続け、
//! admission を通るリクエストをすべて処理する。running set が空になり
//! terminate 以外に待っているリクエストがなくなったら終了する。
//!
//! # 設計原則
//! - タスクはどの時点でも policy / running / finished のどれか一箇所にある
//! - executor / resource manager のエラーはログに残してループを継続する
//! - ロックは使わない（actor がすべてを所有する）

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::admission::{self, AdmissionRequest, AdmissionView, TaskView, Verdict};
use super::config::SchedulerConfig;
use super::finished::FinishedSet;
use super::liveness::{LivenessMonitor, bounded};
use super::mailbox::{IdList, Mailbox, Request, RequestKind};
use super::shutdown::{ShutdownController, ShutdownMode};
use crate::domain::errors::ExecutorError;
use crate::domain::{NewTask, TaskId, TaskInfo, TaskRecord, TaskResult, TaskStatus};
use crate::ports::{BoundNode, Clock, NodeHandle, Policy, ReadyTask, ResourceManager, ResultHandle};

pub const MSG_DELETED_FROM_QUEUE: &str = "task has been deleted from the scheduler queue";
pub const MSG_KILLED_WHILE_RUNNING: &str = "task was killed before execution finished";

/// Actor state minus the mailbox, so admission can borrow it while the
/// mailbox is being waited on.
struct SchedulerState {
    config: SchedulerConfig,
    policy: Box<dyn Policy>,
    resource_manager: Arc<dyn ResourceManager>,
    clock: Arc<dyn Clock>,
    running: Vec<TaskRecord>,
    finished: FinishedSet,
    liveness: LivenessMonitor,
    shutdown: ShutdownController,
}

pub struct Scheduler {
    mailbox: Mailbox,
    state: SchedulerState,
    terminators: Vec<oneshot::Sender<bool>>,
}

impl Scheduler {
    pub(crate) fn new(
        config: SchedulerConfig,
        policy: Box<dyn Policy>,
        resource_manager: Arc<dyn ResourceManager>,
        clock: Arc<dyn Clock>,
        rx: mpsc::UnboundedReceiver<Request>,
    ) -> Self {
        let liveness =
            LivenessMonitor::new(config.time_before_test_alive, config.executor_call_timeout);
        Self {
            mailbox: Mailbox::new(rx),
            state: SchedulerState {
                config,
                policy,
                resource_manager,
                clock,
                running: Vec::new(),
                finished: FinishedSet::new(),
                liveness,
                shutdown: ShutdownController::new(),
            },
            terminators: Vec::new(),
        }
    }

    /// Runs until a terminate request is granted (or every handle is gone
    /// and the drain finished).
    pub async fn run(mut self) {
        info!(
            scheduler_timeout_ms = self.state.config.scheduler_timeout.as_millis() as u64,
            time_before_test_alive_ms = self.state.config.time_before_test_alive.as_millis() as u64,
            "scheduler started"
        );

        while !self.state.shutdown.is_requested() {
            self.serve_kind(RequestKind::Submit).await;
            self.serve_kind(RequestKind::IsFinished).await;

            self.state.schedule().await;
            self.state.manage_running_tasks().await;
            self.state.probe_liveness().await;

            self.serve_kind(RequestKind::Submit).await;
            self.serve_kind(RequestKind::IsFinished).await;

            if self.mailbox.is_closed() && self.mailbox.pending_len() == 0 {
                info!("every scheduler handle was dropped; draining");
                self.state.request_shutdown(false).await;
                break;
            }

            let timeout = self.state.config.scheduler_timeout;
            let state = &self.state;
            let next = self
                .mailbox
                .wait_for(timeout, |r| admission::accept(r.as_admission(), state).admits())
                .await;
            if let Some(request) = next {
                self.serve(request).await;
            }
        }

        self.drain().await;
    }

    async fn drain(&mut self) {
        loop {
            self.state.manage_running_tasks().await;
            self.state.probe_liveness().await;

            loop {
                let state = &self.state;
                let next = self
                    .mailbox
                    .take_first(|r| admission::accept(r.as_admission(), state).admits());
                let Some(request) = next else {
                    break;
                };
                self.serve(request).await;
            }

            let running = self.state.running.len();
            let only_terminate = self.mailbox.only_terminate_left();
            if self.state.shutdown.drain_complete(running, only_terminate)
                && (!self.terminators.is_empty() || self.mailbox.is_closed())
            {
                break;
            }

            self.mailbox
                .wait_arrival(self.state.config.scheduler_timeout)
                .await;
        }

        // Soft shutdown leaves queued tasks and uncollected results in place.
        let (abandoned, uncollected) = if self.state.shutdown.mode() == Some(ShutdownMode::Hard) {
            (self.state.policy.flush().len(), self.state.finished.clear())
        } else {
            (0, 0)
        };
        info!(
            mode = ?self.state.shutdown.mode(),
            terminators = self.terminators.len(),
            abandoned_tasks = abandoned,
            uncollected_results = uncollected,
            "scheduler terminated"
        );
        for reply in self.terminators.drain(..) {
            respond(reply, true);
        }
    }

    async fn serve_kind(&mut self, kind: RequestKind) {
        for request in self.mailbox.take_all(kind) {
            self.serve(request).await;
        }
    }

    async fn serve(&mut self, request: Request) {
        match request {
            Request::Submit { tasks, reply } => {
                self.state.submit(tasks);
                respond(reply, ());
            }
            Request::IsFinished { task_id, reply } => {
                respond(reply, self.state.is_finished(&task_id));
            }
            Request::GetResult {
                task_id,
                user,
                reply,
            } => {
                if reply.is_closed() {
                    debug!(task_id = %task_id, user = %user, "result caller went away; result kept");
                    return;
                }
                let verdict = admission::accept(
                    AdmissionRequest::GetResult {
                        task_id: &task_id,
                        user: &user,
                    },
                    &self.state,
                );
                match self.state.collect_result(&task_id, &user, verdict) {
                    Some(result) => respond(reply, result),
                    None => self.mailbox.defer(Request::GetResult {
                        task_id,
                        user,
                        reply,
                    }),
                }
            }
            Request::Del {
                task_id,
                user,
                reply,
            } => {
                let deleted = self.state.del(&task_id, &user).await;
                respond(reply, deleted);
            }
            Request::Shutdown { immediate, reply } => {
                self.state.request_shutdown(immediate).await;
                respond(reply, ());
            }
            Request::TerminateScheduler { reply } => {
                debug!("terminate request parked until the drain completes");
                self.terminators.push(reply);
            }
            Request::Info { task_id, reply } => respond(reply, self.state.info(&task_id)),
            Request::InfoAll { reply } => respond(reply, self.state.info_all()),
            Request::Ids { list, reply } => respond(reply, self.state.ids(list)),
            Request::IsInQueue { task_id, reply } => {
                respond(reply, self.state.policy.get_task(&task_id).is_some());
            }
            Request::IsRunning { task_id, reply } => {
                respond(reply, self.state.running_index(&task_id).is_some());
            }
        }
    }
}

fn respond<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        debug!("client went away before the reply was sent");
    }
}

impl SchedulerState {
    fn record(&self, task_id: &TaskId) -> Option<&TaskRecord> {
        self.finished
            .get_task(task_id)
            .or_else(|| self.running.iter().find(|t| t.task_id() == task_id))
            .or_else(|| self.policy.get_task(task_id))
    }

    fn running_index(&self, task_id: &TaskId) -> Option<usize> {
        self.running.iter().position(|t| t.task_id() == task_id)
    }

    fn submit(&mut self, tasks: Vec<NewTask>) {
        let now = self.clock.now();
        let mut accepted: Vec<TaskRecord> = Vec::with_capacity(tasks.len());
        for task in tasks {
            let duplicate = self.record(&task.task_id).is_some()
                || accepted.iter().any(|t| t.task_id() == &task.task_id);
            if duplicate {
                warn!(task_id = %task.task_id, "task id already known; submission skipped");
                continue;
            }
            let mut record = TaskRecord::new(task, now);
            record.mark_queued(now);
            debug!(task_id = %record.task_id(), owner = record.owner(), "task queued");
            accepted.push(record);
        }
        if accepted.is_empty() {
            return;
        }
        info!(
            count = accepted.len(),
            shutting_down = self.shutdown.is_requested(),
            "tasks submitted"
        );
        self.policy.insert(accepted);
    }

    fn is_finished(&self, task_id: &TaskId) -> bool {
        self.finished.get_task(task_id).is_some()
    }

    /// Launch every task the policy hands out.
    async fn schedule(&mut self) {
        let ready = self.policy.get_ready_tasks().await;
        if ready.is_empty() {
            return;
        }

        let mut troubled = Vec::new();
        for ReadyTask { mut task, node } in ready {
            match self.launch(&node, task.payload().clone()).await {
                Ok(handle) => {
                    info!(
                        task_id = %task.task_id(),
                        node = %node.node.url,
                        "task launched"
                    );
                    task.mark_running(node, handle, self.clock.now());
                    self.running.push(task);
                }
                Err(err) => {
                    task.mark_launch_failed();
                    warn!(
                        task_id = %task.task_id(),
                        node = %node.node.url,
                        failures = task.failures(),
                        error = %err,
                        "launch failed; task goes back to the policy"
                    );
                    self.kill_executor(&node).await;
                    troubled.push(node.node);
                    self.policy.failed(task);
                }
            }
        }
        self.free_nodes(troubled).await;
    }

    async fn launch(
        &self,
        node: &BoundNode,
        payload: serde_json::Value,
    ) -> Result<ResultHandle, ExecutorError> {
        let limit = self.config.executor_call_timeout;
        bounded(limit, node.executor.ping()).await?;
        bounded(limit, node.executor.start(payload)).await
    }

    /// Move every running task whose result arrived into the finished set.
    async fn manage_running_tasks(&mut self) {
        let now = self.clock.now();
        let mut freed = Vec::new();
        let mut i = 0;
        while i < self.running.len() {
            let Some(node) = self.running[i].try_finish(now) else {
                i += 1;
                continue;
            };
            let task = self.running.remove(i);
            self.policy.finished(&task);
            info!(
                task_id = %task.task_id(),
                success = task.outcome().is_some_and(|o| o.is_success()),
                "task finished"
            );
            freed.push(node.node);
            self.finished.push(task);
        }
        self.free_nodes(freed).await;
    }

    async fn probe_liveness(&mut self) {
        let Some(report) = self.liveness.probe(&mut self.running).await else {
            return;
        };
        for task in report.failed {
            self.policy.failed(task);
        }
        self.free_nodes(report.troubled_nodes).await;
    }

    fn collect_result(
        &mut self,
        task_id: &TaskId,
        user: &str,
        verdict: Verdict,
    ) -> Option<TaskResult> {
        if let Verdict::Synthesize(message) = verdict {
            debug!(task_id = %task_id, user, message, "answering with a synthetic error");
            self.finished
                .push_synthetic(task_id.clone(), user.to_string(), message);
        }
        let result = self.finished.take(task_id, user)?;
        info!(task_id = %task_id, user, status = %result.status, "result collected");
        Some(result)
    }

    async fn del(&mut self, task_id: &TaskId, user: &str) -> bool {
        let Some(view) = self.lookup(task_id) else {
            debug!(task_id = %task_id, "del on unknown task");
            return false;
        };
        let authorized = view.owner == user || user == self.config.admin_user;
        let finished = view.finished;
        if !authorized {
            warn!(task_id = %task_id, user, "del refused: not the owner");
            return false;
        }
        if finished {
            return false;
        }

        if let Some(mut task) = self.policy.remove_task(task_id) {
            task.mark_killed(MSG_DELETED_FROM_QUEUE, self.clock.now());
            info!(task_id = %task_id, user, "queued task deleted");
            self.finished.push(task);
            return true;
        }

        let Some(pos) = self.running_index(task_id) else {
            return false;
        };
        if !self.running[pos].is_result_pending() {
            // Finished already; finalize it instead of killing.
            self.manage_running_tasks().await;
            return false;
        }

        let mut task = self.running.remove(pos);
        if let Some(node) = task.node().cloned() {
            self.kill_executor(&node).await;
        }
        let freed = task.mark_killed(MSG_KILLED_WHILE_RUNNING, self.clock.now());
        self.policy.finished(&task);
        info!(task_id = %task_id, user, "running task killed");
        self.finished.push(task);
        self.free_nodes(freed.into_iter().map(|n| n.node).collect())
            .await;
        true
    }

    async fn request_shutdown(&mut self, immediate: bool) {
        let Some(mode) = self.shutdown.request(immediate) else {
            debug!(immediate, "shutdown already requested");
            return;
        };
        info!(
            mode = %mode,
            running = self.running.len(),
            "shutdown requested"
        );
        if mode == ShutdownMode::Hard {
            self.kill_all_running().await;
        }
    }

    async fn kill_all_running(&mut self) {
        // Results that already arrived are delivered, not thrown away.
        self.manage_running_tasks().await;

        let now = self.clock.now();
        let mut freed = Vec::new();
        for mut task in std::mem::take(&mut self.running) {
            if let Some(node) = task.node().cloned() {
                self.kill_executor(&node).await;
            }
            if let Some(node) = task.mark_killed(MSG_KILLED_WHILE_RUNNING, now) {
                freed.push(node.node);
            }
            self.policy.finished(&task);
            info!(task_id = %task.task_id(), "task killed by hard shutdown");
            self.finished.push(task);
        }
        self.free_nodes(freed).await;

        let flushed = self.policy.flush();
        if !flushed.is_empty() {
            info!(count = flushed.len(), "policy flushed; queued tasks discarded");
        }
    }

    /// Forced kill; a dropped connection is the expected answer.
    async fn kill_executor(&self, node: &BoundNode) {
        match bounded(self.config.executor_call_timeout, node.executor.kill()).await {
            Ok(()) => debug!(node = %node.node.url, "executor killed"),
            Err(err) if err.is_communication() => {
                info!(node = %node.node.url, "executor killed (connection dropped)");
            }
            Err(err) => warn!(node = %node.node.url, error = %err, "executor kill failed"),
        }
    }

    async fn free_nodes(&self, nodes: Vec<NodeHandle>) {
        if nodes.is_empty() {
            return;
        }
        let count = nodes.len();
        if let Err(err) = self.resource_manager.free_nodes(nodes).await {
            warn!(count, error = %err, "failed to free nodes; ignoring");
        }
    }

    fn info(&self, task_id: &TaskId) -> TaskInfo {
        self.record(task_id)
            .map(TaskRecord::info)
            .unwrap_or_else(|| TaskInfo::unknown(task_id.clone()))
    }

    fn info_all(&self) -> Vec<TaskInfo> {
        let mut infos = self.policy.info_all();
        infos.extend(self.running.iter().map(TaskRecord::info));
        infos.extend(self.finished.infos());
        infos
    }

    fn ids(&self, list: IdList) -> Vec<TaskId> {
        match list {
            IdList::Queued => self.policy.queued_ids(),
            IdList::Failed => self.policy.failed_ids(),
            IdList::Running => self.running.iter().map(|t| t.task_id().clone()).collect(),
            IdList::Killed => self.finished.ids_with_status(TaskStatus::Killed),
            IdList::Finished => self.finished.ids_with_status(TaskStatus::Finished),
        }
    }
}

impl AdmissionView for SchedulerState {
    fn is_shutting_down(&self) -> bool {
        self.shutdown.is_requested()
    }

    fn lookup(&self, task_id: &TaskId) -> Option<TaskView<'_>> {
        if let Some(task) = self.finished.get_task(task_id) {
            return Some(TaskView {
                owner: task.owner(),
                status: task.status(),
                finished: true,
            });
        }
        self.running
            .iter()
            .find(|t| t.task_id() == task_id)
            .or_else(|| self.policy.get_task(task_id))
            .map(|task| TaskView {
                owner: task.owner(),
                status: task.status(),
                finished: false,
            })
    }
}
