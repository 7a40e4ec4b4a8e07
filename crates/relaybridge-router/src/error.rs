use thiserror::Error;

use relaybridge_channels::ChannelError;
use relaybridge_core::error::CoreError;
use relaybridge_policy::PolicyError;
use relaybridge_sessions::SessionsError;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("prompt has expired")]
    PromptExpired,

    #[error("reply session does not match the prompt's session")]
    SessionMismatch,

    #[error("reply's channel identity is malformed")]
    MalformedIdentity,

    #[error("identity is not allowlisted for this channel")]
    NotAllowlisted,

    #[error("nonce has already been used")]
    NonceReused,

    #[error("autopilot execution failed: {0}")]
    Autopilot(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Sessions(#[from] SessionsError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, RouterError>;
