//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてスケジューラ本体を実装します。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 構築とワイヤリング（policy registry を含む）
//! - **Scheduler**: すべての状態を所有する actor
//! - **SchedulerHandle**: クライアント API
//! - **admission**: リクエストを今サービスしてよいかを決める純粋関数
//! - **LivenessMonitor**: RUNNING タスクの executor の定期 ping
//! - **ShutdownController**: soft / hard シャットダウン

pub mod admission;
pub mod builder;
pub mod config;
pub mod finished;
pub mod handle;
pub mod liveness;
pub mod mailbox;
pub mod scheduler;
pub mod shutdown;

// 主要な型を再エクスポート
pub use self::builder::{PolicyRegistry, SchedulerBuilder};
pub use self::config::SchedulerConfig;
pub use self::handle::SchedulerHandle;
pub use self::scheduler::Scheduler;
pub use self::shutdown::ShutdownMode;
