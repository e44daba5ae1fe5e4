//! LocalExecutor - 同一プロセス内で payload を実行する executor
//!
//! payload は `{"handler": "<name>", "input": <any JSON>}` の形。
//! handler 名で [`HandlerRegistry`] を引き、tokio task として実行する。
//! 結果は [`ResultSender`] 経由で deferred handle に届く。
//!
//! `set_healthy(false)` でノード障害を再現できる（ping / start が通信エラーになる）。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::errors::{ExecutorError, RegistryError};
use crate::domain::TaskOutcome;
use crate::ports::{Executor, ResultHandle, result_channel};

/// A named piece of work the local executor can run.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, input: serde_json::Value) -> Result<serde_json::Value, String>;
}

/// Registry of handlers (name -> handler).
///
/// Design:
/// - Built during initialization (mutable).
/// - Shared read-only by every executor afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct Invocation {
    handler: String,
    #[serde(default)]
    input: serde_json::Value,
}

pub struct LocalExecutor {
    registry: Arc<HandlerRegistry>,
    healthy: AtomicBool,
    job: Mutex<Option<JoinHandle<()>>>,
}

impl LocalExecutor {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            healthy: AtomicBool::new(true),
            job: Mutex::new(None),
        }
    }

    /// Simulate the node going down (or coming back).
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), ExecutorError> {
        if self.is_healthy() {
            Ok(())
        } else {
            Err(ExecutorError::Communication("node is unreachable".into()))
        }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn ping(&self) -> Result<(), ExecutorError> {
        self.check_reachable()
    }

    async fn start(&self, payload: serde_json::Value) -> Result<ResultHandle, ExecutorError> {
        self.check_reachable()?;
        let invocation: Invocation = serde_json::from_value(payload)
            .map_err(|e| ExecutorError::Rejected(format!("malformed payload: {e}")))?;
        let handler = self
            .registry
            .get(&invocation.handler)
            .cloned()
            .ok_or_else(|| {
                ExecutorError::Rejected(format!("no handler named '{}'", invocation.handler))
            })?;

        let (sender, handle) = result_channel();
        let name = invocation.handler;
        let input = invocation.input;
        let job = tokio::spawn(async move {
            let outcome = match handler.handle(input).await {
                Ok(value) => TaskOutcome::Success(value),
                Err(message) => TaskOutcome::error(message),
            };
            if !sender.resolve(outcome) {
                debug!(handler = %name, "result dropped; scheduler no longer waiting");
            }
        });

        if let Some(previous) = self.job.lock().await.replace(job) {
            previous.abort();
        }
        Ok(handle)
    }

    /// Aborts the running job. Like a remote process dying, this always
    /// reports a lost connection.
    async fn kill(&self) -> Result<(), ExecutorError> {
        if let Some(job) = self.job.lock().await.take() {
            job.abort();
        }
        Err(ExecutorError::Communication(
            "executor process terminated".into(),
        ))
    }
}
