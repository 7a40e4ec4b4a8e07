use relaybridge_channels::ChannelError;

/// Errors produced by the Telegram adapter, before they're folded into the
/// channel-wide [`ChannelError`] surface.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("teloxide error: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("no bot token configured")]
    NoToken,

    #[error("chat id {0:?} is not a valid Telegram thread id")]
    InvalidThreadId(Option<String>),

    #[error("no session bound to chat {0}")]
    NoBinding(i64),
}

impl From<TelegramError> for ChannelError {
    fn from(e: TelegramError) -> Self {
        match e {
            TelegramError::Teloxide(err) => ChannelError::SendFailed(err.to_string()),
            TelegramError::NoToken => ChannelError::ConfigError(e.to_string()),
            TelegramError::InvalidThreadId(_) => ChannelError::ConfigError(e.to_string()),
            TelegramError::NoBinding(_) => ChannelError::SendFailed(e.to_string()),
        }
    }
}
