//! ShutdownController - soft / hard シャットダウンの状態機械
//!
//! - Soft: 新規 launch を止め、RUNNING タスクの自然終了を待つ。policy のキューは残す
//! - Hard: RUNNING タスクを強制 kill して KILLED にし、policy を flush する
//!
//! 二度目以降の要求は何もしない（冪等）。

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    Soft,
    Hard,
}

impl ShutdownMode {
    pub fn from_immediate(immediate: bool) -> Self {
        if immediate {
            ShutdownMode::Hard
        } else {
            ShutdownMode::Soft
        }
    }
}

impl fmt::Display for ShutdownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownMode::Soft => f.write_str("soft"),
            ShutdownMode::Hard => f.write_str("hard"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ShutdownController {
    mode: Option<ShutdownMode>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self { mode: None }
    }

    /// Returns the selected mode the first time, `None` on every later call.
    pub fn request(&mut self, immediate: bool) -> Option<ShutdownMode> {
        if self.mode.is_some() {
            return None;
        }
        let mode = ShutdownMode::from_immediate(immediate);
        self.mode = Some(mode);
        Some(mode)
    }

    pub fn is_requested(&self) -> bool {
        self.mode.is_some()
    }

    pub fn mode(&self) -> Option<ShutdownMode> {
        self.mode
    }

    /// The drain is over once nothing runs and nothing but terminate requests
    /// (or nothing at all) is waiting.
    pub fn drain_complete(&self, running: usize, only_terminate_pending: bool) -> bool {
        self.is_requested() && running == 0 && only_terminate_pending
    }
}
