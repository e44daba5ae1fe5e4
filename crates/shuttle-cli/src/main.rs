use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use shuttle_core::impls::{HandlerRegistry, InMemoryResourceManager, LocalExecutor, TaskHandler};
use shuttle_core::ports::{BoundNode, Executor, NodeHandle, ResourceManager};
use shuttle_core::{NewTask, SchedulerBuilder, SchedulerConfig};

const NODES: usize = 3;
const OWNER: &str = "demo";
/// Names a handler nobody registered, so every launch is rejected.
const UNLAUNCHABLE: &str = "typo";

struct EchoHandler;

#[async_trait]
impl TaskHandler for EchoHandler {
    async fn handle(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        Ok(input)
    }
}

#[derive(Debug, Deserialize)]
struct SleepPayload {
    ms: u64,
}

/// Sleeps for `ms`, then reports how long it slept.
struct SleepHandler;

#[async_trait]
impl TaskHandler for SleepHandler {
    async fn handle(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let p: SleepPayload =
            serde_json::from_value(input).map_err(|e| format!("json decode: {e}"))?;
        sleep(Duration::from_millis(p.ms)).await;
        Ok(serde_json::json!({ "slept_ms": p.ms }))
    }
}

/// Fails about one run in three.
struct FlakyHandler;

#[async_trait]
impl TaskHandler for FlakyHandler {
    async fn handle(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let fail = rand::thread_rng().gen_bool(1.0 / 3.0);
        sleep(Duration::from_millis(50)).await;
        if fail {
            return Err("intentional failure".to_string());
        }
        Ok(input)
    }
}

fn handlers() -> Result<HandlerRegistry, Box<dyn Error>> {
    let mut reg = HandlerRegistry::new();
    reg.register("echo", Arc::new(EchoHandler))?;
    reg.register("sleep", Arc::new(SleepHandler))?;
    reg.register("flaky", Arc::new(FlakyHandler))?;
    Ok(reg)
}

fn demo_tasks() -> Vec<NewTask> {
    vec![
        NewTask::new("hello", OWNER, serde_json::json!({"handler": "echo", "input": "hello, shuttle"})),
        NewTask::new("nap-1", OWNER, serde_json::json!({"handler": "sleep", "input": {"ms": 300}})),
        NewTask::new("nap-2", OWNER, serde_json::json!({"handler": "sleep", "input": {"ms": 150}})),
        NewTask::new("coin-1", OWNER, serde_json::json!({"handler": "flaky", "input": 1})),
        NewTask::new("coin-2", OWNER, serde_json::json!({"handler": "flaky", "input": 2})),
        NewTask::new(UNLAUNCHABLE, OWNER, serde_json::json!({"handler": "ecko", "input": null})),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SchedulerConfig::from_env()?;
    info!(?config, "loaded scheduler config");

    // (A) ノードプールと executor を用意
    let registry = Arc::new(handlers()?);
    let pool = Arc::new(InMemoryResourceManager::with_nodes((0..NODES).map(|i| {
        let executor: Arc<dyn Executor> = Arc::new(LocalExecutor::new(Arc::clone(&registry)));
        BoundNode::new(NodeHandle::new(format!("local://node-{i}")), executor)
    })));

    // (B) スケジューラを起動
    let (scheduler, join) = SchedulerBuilder::new()
        .config(config)
        .resource_manager(pool as Arc<dyn ResourceManager>)
        .spawn()?;

    // (C) タスク投入
    let tasks = demo_tasks();
    let ids: Vec<_> = tasks.iter().map(|t| t.task_id.clone()).collect();
    scheduler.submit(tasks).await?;

    // (D) 結果を回収（get_result は結果が出るまで返らない）
    for id in ids.iter().filter(|id| id.as_str() != UNLAUNCHABLE) {
        let result = scheduler.get_result(id.clone(), OWNER).await?;
        println!("{}", serde_json::to_string(&result)?);
    }

    for info in scheduler.info_all().await? {
        println!("{}", serde_json::to_string(&info)?);
    }

    // (E) soft shutdown → 起動できなかったタスクには ERROR が返る → terminate
    scheduler.shutdown(false).await?;
    let result = scheduler.get_result(UNLAUNCHABLE, OWNER).await?;
    println!("{}", serde_json::to_string(&result)?);
    if !scheduler.terminate_scheduler().await? {
        warn!("scheduler refused to terminate");
    }
    join.await?;
    Ok(())
}
