use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_COLS: u16 = 220;
pub const DEFAULT_ROWS: u16 = 50;
pub const GRACEFUL_STOP_TIMEOUT_MS: u64 = 5_000;
pub const STALL_WATCHDOG_INTERVAL_MS: u64 = 1_000;

/// Arguments needed to spawn a child inside a PTY.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnSpec {
    pub argv: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub cwd: String,
    #[serde(default = "default_cols")]
    pub cols: u16,
    #[serde(default = "default_rows")]
    pub rows: u16,
}

fn default_cols() -> u16 {
    DEFAULT_COLS
}
fn default_rows() -> u16 {
    DEFAULT_ROWS
}

impl SpawnSpec {
    pub fn new(argv: Vec<String>, cwd: impl Into<String>) -> Self {
        Self {
            argv,
            env: HashMap::new(),
            cwd: cwd.into(),
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

/// Whether the child's most recent exit looked like a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    pub exit_code: Option<i32>,
    pub crashed: bool,
}
