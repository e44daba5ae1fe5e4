//! Ports - 抽象化レイヤー
//!
//! スケジューラが外部コラボレータとして扱うものを trait で定義します。
//! スケジューラは境界を越えて値（タスク、ノードハンドル）を受け渡すだけで、
//! 可変状態は共有しません。

pub mod clock;
pub mod executor;
pub mod policy;
pub mod resource_manager;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::executor::{BoundNode, Executor, NodeHandle, ResultHandle, ResultSender, result_channel};
pub use self::policy::{Policy, PolicyContext, ReadyTask};
pub use self::resource_manager::ResourceManager;
