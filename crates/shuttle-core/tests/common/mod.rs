//! Shared wiring for the scheduler integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use shuttle_core::domain::TaskStatus;
use shuttle_core::impls::{HandlerRegistry, InMemoryResourceManager, LocalExecutor, TaskHandler};
use shuttle_core::ports::{BoundNode, NodeHandle, ResourceManager};
use shuttle_core::{NewTask, SchedulerBuilder, SchedulerConfig, SchedulerHandle, TaskInfo};

pub const WAIT: Duration = Duration::from_secs(3);

struct Echo;

#[async_trait]
impl TaskHandler for Echo {
    async fn handle(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        Ok(input)
    }
}

/// Blocks until the test hands out a permit.
struct Latch(Arc<Semaphore>);

#[async_trait]
impl TaskHandler for Latch {
    async fn handle(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let permit = self.0.acquire().await.map_err(|e| e.to_string())?;
        permit.forget();
        Ok(input)
    }
}

pub struct Harness {
    pub handle: SchedulerHandle,
    pub join: JoinHandle<()>,
    pub pool: Arc<InMemoryResourceManager>,
    pub executors: Vec<Arc<LocalExecutor>>,
    pub latch: Arc<Semaphore>,
}

pub fn config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_scheduler_timeout(Duration::from_millis(10))
        .with_time_before_test_alive(Duration::from_millis(40))
        .with_executor_call_timeout(Duration::from_millis(200))
}

/// A running scheduler over `nodes` local executors (`local://n0`, `local://n1`, ...).
pub fn harness(nodes: usize) -> Harness {
    let latch = Arc::new(Semaphore::new(0));
    let mut registry = HandlerRegistry::new();
    registry.register("echo", Arc::new(Echo)).unwrap();
    registry
        .register("latch", Arc::new(Latch(Arc::clone(&latch))))
        .unwrap();
    let registry = Arc::new(registry);

    let executors: Vec<Arc<LocalExecutor>> = (0..nodes)
        .map(|_| Arc::new(LocalExecutor::new(Arc::clone(&registry))))
        .collect();
    let pool = Arc::new(InMemoryResourceManager::with_nodes(
        executors.iter().enumerate().map(|(i, exec)| {
            BoundNode::new(
                NodeHandle::new(format!("local://n{i}")),
                Arc::clone(exec) as Arc<dyn shuttle_core::ports::Executor>,
            )
        }),
    ));

    let (handle, join) = SchedulerBuilder::new()
        .config(config())
        .resource_manager(Arc::clone(&pool) as Arc<dyn ResourceManager>)
        .spawn()
        .unwrap();

    Harness {
        handle,
        join,
        pool,
        executors,
        latch,
    }
}

/// Finishes right away with `input` as its value.
pub fn echo(id: &str, owner: &str, input: serde_json::Value) -> NewTask {
    NewTask::new(id, owner, serde_json::json!({"handler": "echo", "input": input}))
}

/// Runs until the test releases the latch; the value is the task id.
pub fn held(id: &str, owner: &str) -> NewTask {
    NewTask::new(id, owner, serde_json::json!({"handler": "latch", "input": id}))
}

/// Polls `info(id)` until `pred` holds.
pub async fn wait_info<F>(handle: &SchedulerHandle, id: &str, pred: F) -> TaskInfo
where
    F: Fn(&TaskInfo) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let info = handle.info(id).await.unwrap();
            if pred(&info) {
                return info;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("task {id} never reached the expected state"))
}

pub async fn wait_status(handle: &SchedulerHandle, id: &str, status: TaskStatus) -> TaskInfo {
    wait_info(handle, id, |info| info.status == status).await
}

/// Soft shutdown, terminate, and wait for the actor to exit.
pub async fn stop(h: Harness) {
    h.handle.shutdown(false).await.unwrap();
    h.latch.add_permits(64);
    let granted = tokio::time::timeout(WAIT, h.handle.terminate_scheduler())
        .await
        .unwrap()
        .unwrap();
    assert!(granted);
    tokio::time::timeout(WAIT, h.join).await.unwrap().unwrap();
}
