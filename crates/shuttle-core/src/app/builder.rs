//! SchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 設定値・policy 名・resource manager を build() で検査
//! - policy は名前付き factory の registry から選ぶ
//!
//! # 使用例
//! ```ignore
//! let (handle, join) = SchedulerBuilder::new()
//!     .config(SchedulerConfig::from_env()?)
//!     .resource_manager(Arc::new(pool))
//!     .policy("fifo")
//!     .spawn()?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::config::SchedulerConfig;
use super::handle::SchedulerHandle;
use super::scheduler::Scheduler;
use crate::domain::errors::{BuildError, RegistryError};
use crate::impls::fifo_policy::{DEFAULT_MAX_FAILURES, FifoPolicy};
use crate::ports::{Clock, Policy, PolicyContext, ResourceManager, SystemClock};

pub const DEFAULT_POLICY: &str = "fifo";

/// Builds a policy from the collaborators the scheduler was wired with.
pub type PolicyFactory =
    Box<dyn Fn(PolicyContext) -> Result<Box<dyn Policy>, String> + Send + Sync>;

/// PolicyRegistry は名前付き policy factory を管理
pub struct PolicyRegistry {
    factories: HashMap<String, PolicyFactory>,
}

impl PolicyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the bundled policies (`fifo`).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            DEFAULT_POLICY.to_string(),
            Box::new(|ctx: PolicyContext| {
                Ok(Box::new(FifoPolicy::new(ctx, DEFAULT_MAX_FAILURES)) as Box<dyn Policy>)
            }),
        );
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(PolicyContext) -> Result<Box<dyn Policy>, String> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    pub fn create(&self, name: &str, ctx: PolicyContext) -> Result<Box<dyn Policy>, BuildError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BuildError::UnknownPolicy(name.to_string()))?;
        factory(ctx).map_err(|reason| BuildError::PolicyFactory {
            name: name.to_string(),
            reason,
        })
    }

    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// SchedulerBuilder はスケジューラ actor を構築
///
/// # Fail-fast 設計
/// - config.validate() を build() 時にもう一度実行
/// - policy 名が未登録なら BuildError::UnknownPolicy
/// - resource manager が未設定なら BuildError::MissingResourceManager
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    resource_manager: Option<Arc<dyn ResourceManager>>,
    clock: Arc<dyn Clock>,
    policy: String,
    registry: PolicyRegistry,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            resource_manager: None,
            clock: Arc::new(SystemClock),
            policy: DEFAULT_POLICY.to_string(),
            registry: PolicyRegistry::with_defaults(),
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resource_manager(mut self, resource_manager: Arc<dyn ResourceManager>) -> Self {
        self.resource_manager = Some(resource_manager);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Select a registered policy by name.
    pub fn policy(mut self, name: impl Into<String>) -> Self {
        self.policy = name.into();
        self
    }

    /// Register an extra policy factory.
    pub fn register_policy<F>(
        mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<Self, RegistryError>
    where
        F: Fn(PolicyContext) -> Result<Box<dyn Policy>, String> + Send + Sync + 'static,
    {
        self.registry.register(name, factory)?;
        Ok(self)
    }

    /// Wire everything and return the actor without starting it.
    pub fn build(self) -> Result<(SchedulerHandle, Scheduler), BuildError> {
        self.config.validate()?;
        let resource_manager = self
            .resource_manager
            .ok_or(BuildError::MissingResourceManager)?;
        let ctx = PolicyContext {
            resource_manager: Arc::clone(&resource_manager),
            clock: Arc::clone(&self.clock),
        };
        let policy = self.registry.create(&self.policy, ctx)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(self.config, policy, resource_manager, self.clock, rx);
        Ok((SchedulerHandle::new(tx), scheduler))
    }

    /// Build and spawn the actor on the current tokio runtime.
    pub fn spawn(self) -> Result<(SchedulerHandle, JoinHandle<()>), BuildError> {
        let (handle, scheduler) = self.build()?;
        Ok((handle, tokio::spawn(scheduler.run())))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
