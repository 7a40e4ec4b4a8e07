use relaybridge_channels::ChannelError;

/// Errors produced by the Slack adapter, before they're folded into the
/// channel-wide [`ChannelError`] surface.
#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("slack api error: {0}")]
    Api(String),

    #[error("slack socket mode error: {0}")]
    SocketMode(String),

    #[error("no bot token configured")]
    NoToken,

    #[error("channel/thread {0:?} is not a valid Slack thread reference")]
    InvalidThreadId(Option<String>),

    #[error("no session bound to channel {0}")]
    NoBinding(String),
}

impl From<SlackError> for ChannelError {
    fn from(e: SlackError) -> Self {
        match e {
            SlackError::Api(msg) => ChannelError::SendFailed(msg),
            SlackError::SocketMode(msg) => ChannelError::ConnectionFailed(msg),
            SlackError::NoToken => ChannelError::ConfigError(e.to_string()),
            SlackError::InvalidThreadId(_) => ChannelError::ConfigError(e.to_string()),
            SlackError::NoBinding(_) => ChannelError::SendFailed(e.to_string()),
        }
    }
}
