use serde::Serialize;

/// Exit codes per the CLI surface: 0 success, 1 operation failed, 2 misconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    OperationFailed = 1,
    Misconfiguration = 2,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Prints `value` as pretty JSON when `json` is set, otherwise via `human`.
pub fn emit<T: Serialize>(value: &T, json: bool, human: impl FnOnce(&T)) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to serialize output: {e}"),
        }
    } else {
        human(value);
    }
}
