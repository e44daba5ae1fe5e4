//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **FifoPolicy**: 到着順の policy（registry に "fifo" で登録済み）
//! - **InMemoryResourceManager**: 開発用のノードプール
//! - **LocalExecutor**: handler registry を使ってプロセス内で実行する executor

pub mod fifo_policy;
pub mod inmem_resource_manager;
pub mod local_executor;

// 主要な型を再エクスポート
pub use self::fifo_policy::FifoPolicy;
pub use self::inmem_resource_manager::InMemoryResourceManager;
pub use self::local_executor::{HandlerRegistry, LocalExecutor, TaskHandler};
