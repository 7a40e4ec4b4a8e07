use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy file not found: {0}")]
    NotFound(String),

    #[error("cannot read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML syntax error in {source_label}: {message}")]
    Yaml { source_label: String, message: String },

    #[error("unsupported policy_version {0:?}")]
    UnsupportedVersion(String),

    #[error("{path}: {message}")]
    Validation { path: String, message: String },

    #[error("circular extends detected: {chain}")]
    CircularExtends { chain: String },

    #[error("extends target {0} must be a v1 policy")]
    ExtendsNotV1(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
