use thiserror::Error;

#[derive(Debug, Error)]
pub enum InteractError {
    #[error("injection failed: {0}")]
    InjectionFailed(String),

    #[error("interaction timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("escalated to operator after exhausting retries")]
    Escalated,
}

pub type Result<T> = std::result::Result<T, InteractError>;
