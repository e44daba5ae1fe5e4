//! shuttle-core
//!
//! Core building blocks for the Shuttle task scheduler.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, status, task record, info, outcome, errors）
//! - **ports**: 抽象化レイヤー（Policy, ResourceManager, Executor, Clock）
//! - **app**: アプリケーションロジック（scheduler actor, admission, liveness, shutdown, builder）
//! - **impls**: 実装（FifoPolicy, InMemoryResourceManager, LocalExecutor など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{SchedulerBuilder, SchedulerConfig, SchedulerHandle};
pub use domain::{NewTask, TaskId, TaskInfo, TaskOutcome, TaskResult, TaskStatus};
