//! SchedulerConfig - スケジューラの起動パラメータ
//!
//! 環境変数（ミリ秒）から読み込む:
//! - `SCHEDULER_TIMEOUT`: リクエスト待ちの上限
//! - `TIME_BEFORE_TEST_ALIVE`: liveness probe の最小間隔
//! - `EXECUTOR_CALL_TIMEOUT`: executor 呼び出し（ping/start/kill）の上限
//! - `SCHEDULER_ADMIN_USER`: 他人のタスクも削除できるユーザー名
//!
//! 未設定ならデフォルト値、設定されているのに不正なら起動失敗（Fail-fast）。

use std::env;
use std::time::Duration;

use crate::domain::errors::ConfigError;

pub const SCHEDULER_TIMEOUT: &str = "SCHEDULER_TIMEOUT";
pub const TIME_BEFORE_TEST_ALIVE: &str = "TIME_BEFORE_TEST_ALIVE";
pub const EXECUTOR_CALL_TIMEOUT: &str = "EXECUTOR_CALL_TIMEOUT";
pub const SCHEDULER_ADMIN_USER: &str = "SCHEDULER_ADMIN_USER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub scheduler_timeout: Duration,
    pub time_before_test_alive: Duration,
    pub executor_call_timeout: Duration,
    pub admin_user: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_timeout: Duration::from_millis(100),
            time_before_test_alive: Duration::from_millis(2000),
            executor_call_timeout: Duration::from_millis(5000),
            admin_user: "admin".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (environment, properties file, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            scheduler_timeout: millis(&lookup, SCHEDULER_TIMEOUT)?
                .unwrap_or(defaults.scheduler_timeout),
            time_before_test_alive: millis(&lookup, TIME_BEFORE_TEST_ALIVE)?
                .unwrap_or(defaults.time_before_test_alive),
            executor_call_timeout: millis(&lookup, EXECUTOR_CALL_TIMEOUT)?
                .unwrap_or(defaults.executor_call_timeout),
            admin_user: lookup(SCHEDULER_ADMIN_USER)
                .map(|s| s.trim().to_string())
                .unwrap_or(defaults.admin_user),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_scheduler_timeout(mut self, timeout: Duration) -> Self {
        self.scheduler_timeout = timeout;
        self
    }

    pub fn with_time_before_test_alive(mut self, interval: Duration) -> Self {
        self.time_before_test_alive = interval;
        self
    }

    pub fn with_executor_call_timeout(mut self, timeout: Duration) -> Self {
        self.executor_call_timeout = timeout;
        self
    }

    pub fn with_admin_user(mut self, admin_user: impl Into<String>) -> Self {
        self.admin_user = admin_user.into();
        self
    }

    /// Every duration must be at least one millisecond.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive(SCHEDULER_TIMEOUT, self.scheduler_timeout)?;
        positive(TIME_BEFORE_TEST_ALIVE, self.time_before_test_alive)?;
        positive(EXECUTOR_CALL_TIMEOUT, self.executor_call_timeout)?;
        if self.admin_user.is_empty() {
            return Err(ConfigError::Empty {
                key: SCHEDULER_ADMIN_USER,
            });
        }
        Ok(())
    }
}

fn positive(key: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.as_millis() < 1 {
        return Err(ConfigError::NonPositive {
            key,
            value: value.as_millis() as i64,
        });
    }
    Ok(())
}

fn millis<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: i64 = raw.trim().parse().map_err(|_| ConfigError::Unparsable {
        key,
        value: raw.clone(),
    })?;
    if value < 1 {
        return Err(ConfigError::NonPositive { key, value });
    }
    Ok(Some(Duration::from_millis(value as u64)))
}
