//! LivenessMonitor - RUNNING タスクの executor を定期的に ping する
//!
//! # フロー
//! 1. running set が空でなく、前回のパスから `TIME_BEFORE_TEST_ALIVE` 以上経過していれば実行
//! 2. 各タスクの executor を ping（呼び出しは executor_call_timeout で打ち切り）
//! 3. 失敗したタスクはその場で running set から外し、FAILED + failure count を加算
//! 4. 不健全なノードはパスの最後にまとめて返却（呼び出し側が行う）
//!
//! 間隔は「前回パスからの経過時間」で測るので、パスが重なることはない。

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

use crate::domain::errors::ExecutorError;
use crate::domain::TaskRecord;
use crate::ports::executor::NodeHandle;

/// Runs an executor call with an upper bound; an elapsed bound is a failure.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, ExecutorError>
where
    F: Future<Output = Result<T, ExecutorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ExecutorError::TimedOut(limit.as_millis() as u64)),
    }
}

/// Tasks taken out of the running set by a probe pass.
#[derive(Debug, Default)]
pub struct ProbeReport {
    /// FAILED records to hand back to the policy.
    pub failed: Vec<TaskRecord>,
    /// Their nodes, to be freed in one batch.
    pub troubled_nodes: Vec<NodeHandle>,
}

#[derive(Debug)]
pub struct LivenessMonitor {
    interval: Duration,
    call_timeout: Duration,
    last_pass: Instant,
}

impl LivenessMonitor {
    pub fn new(interval: Duration, call_timeout: Duration) -> Self {
        Self {
            interval,
            call_timeout,
            last_pass: Instant::now(),
        }
    }

    pub fn is_due(&self, running: usize, now: Instant) -> bool {
        running > 0 && now.duration_since(self.last_pass) >= self.interval
    }

    /// Probe every running task if a pass is due. Returns `None` when skipped.
    pub async fn probe(&mut self, running: &mut Vec<TaskRecord>) -> Option<ProbeReport> {
        if !self.is_due(running.len(), Instant::now()) {
            return None;
        }

        let mut report = ProbeReport::default();
        let mut i = 0;
        while i < running.len() {
            let Some(node) = running[i].node().cloned() else {
                i += 1;
                continue;
            };
            match bounded(self.call_timeout, node.executor.ping()).await {
                Ok(()) => i += 1,
                Err(err) => {
                    let mut task = running.remove(i);
                    if let Some(bound) = task.mark_probe_failed() {
                        report.troubled_nodes.push(bound.node);
                    }
                    error!(
                        task_id = %task.task_id(),
                        node = %node.node.url,
                        failures = task.failures(),
                        error = %err,
                        "executor failed liveness probe; task goes back to the policy"
                    );
                    report.failed.push(task);
                }
            }
        }

        debug!(
            probed = running.len() + report.failed.len(),
            failed = report.failed.len(),
            "liveness pass done"
        );
        self.last_pass = Instant::now();
        Some(report)
    }
}
