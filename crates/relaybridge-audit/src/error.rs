#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("audit event {event_id} not found")]
    NotFound { event_id: String },

    #[error("workspace trust grant requires a non-empty actor")]
    AnonymousGrant,

    #[error("decision trace entry failed validation: {0}")]
    InvalidTraceEntry(String),
}

pub type Result<T> = std::result::Result<T, AuditError>;
