use thiserror::Error;

/// Errors that can occur while persisting or looking up supervised sessions.
#[derive(Debug, Error)]
pub enum SessionsError {
    /// The requested session does not exist in the database.
    #[error("session not found: {session_id}")]
    NotFound { session_id: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// `argv`/`channel_message_ids` failed to (de)serialize to/from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A conversation's queued-prompt backlog is already at its cap.
    #[error("conversation queue is full for {channel_name}/{thread_id}")]
    QueueFull { channel_name: String, thread_id: String },

    /// The caller has exceeded their allotted rate for this channel identity.
    #[error("rate limit exceeded for {identity}")]
    RateLimited { identity: String },
}

pub type Result<T> = std::result::Result<T, SessionsError>;
