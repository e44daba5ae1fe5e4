//! Errors - エラー型と分類
//!
//! 起動時のエラー（Config / Build / Registry）だけが致命的で、
//! ループ内部で発生するエラー（Executor / Resource）はログに残して回復する。

use thiserror::Error;

/// ConfigError は設定値の検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer (milliseconds), got {value}")]
    NonPositive { key: &'static str, value: i64 },

    #[error("{key} could not be parsed as milliseconds: {value:?}")]
    Unparsable { key: &'static str, value: String },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

/// RegistryError は名前付き登録（policy factory / handler）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("'{0}' is already registered")]
    AlreadyRegistered(String),
}

/// BuildError はスケジューラ構築時のエラー
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid scheduler configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("policy '{0}' is not registered")]
    UnknownPolicy(String),

    #[error("policy '{name}' could not be constructed: {reason}")]
    PolicyFactory { name: String, reason: String },

    #[error("no resource manager was provided")]
    MissingResourceManager,
}

/// ExecutorError はリモート executor 呼び出しのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// The executor could not be reached (or disappeared mid-call).
    #[error("communication with executor failed: {0}")]
    Communication(String),

    /// The executor is reachable but refused the work.
    #[error("executor rejected the request: {0}")]
    Rejected(String),

    #[error("executor call timed out after {0} ms")]
    TimedOut(u64),
}

impl ExecutorError {
    /// `kill` is expected to lose the connection when the process dies.
    pub fn is_communication(&self) -> bool {
        matches!(self, ExecutorError::Communication(_))
    }
}

/// ResourceError はリソースマネージャ呼び出しのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("node {0} is not leased from this resource manager")]
    UnknownNode(String),

    #[error("resource manager unavailable: {0}")]
    Unavailable(String),
}

/// ClientError はクライアントハンドルから見えるエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("scheduler has terminated")]
    SchedulerTerminated,
}
