#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Channel-adapter abstraction: a `Channel` trait every Telegram/Slack
//! adapter implements, a `ChannelManager` that connects them with
//! exponential-backoff-and-jitter, a `MultiChannel` fan-out for
//! cross-channel notices, and a `ChannelCircuitBreaker` so one channel's
//! flakiness never starves the supervisor loop.

pub mod channel;
pub mod circuit_breaker;
pub mod error;
pub mod manager;
pub mod multi;
pub mod types;

pub use channel::Channel;
pub use circuit_breaker::{ChannelCircuitBreaker, CircuitBreakerHealth};
pub use error::ChannelError;
pub use manager::ChannelManager;
pub use multi::MultiChannel;
pub use types::{
    ChannelStatus, Notification, NotifyLevel, OutputChunk, PromptDelivery, SentMessageRef,
};
