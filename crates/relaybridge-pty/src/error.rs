use thiserror::Error;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("pty spawn error: {0}")]
    Spawn(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stop timed out after {ms}ms, sent SIGKILL")]
    StopTimedOut { ms: u64 },

    #[error("session already stopped")]
    AlreadyStopped,

    #[error("pause/resume is not available on this platform")]
    PauseUnavailable,
}

pub type Result<T> = std::result::Result<T, PtyError>;
