use std::collections::HashMap;

use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::{
    channel::Channel,
    circuit_breaker::{ChannelCircuitBreaker, CircuitBreakerHealth},
    error::ChannelError,
    types::{ChannelStatus, Notification, OutputChunk},
};

/// Minimum delay between reconnect attempts (seconds).
const BACKOFF_BASE_SECS: u64 = 5;
/// Maximum delay between reconnect attempts (seconds).
const BACKOFF_MAX_SECS: u64 = 300; // 5 minutes
/// Maximum number of reconnect attempts before giving up on a channel.
const MAX_CONNECT_ATTEMPTS: u32 = 10;
/// Jitter fraction applied to each backoff delay (±10 %).
const JITTER_FRACTION: f64 = 0.10;

/// A registered adapter plus the breaker guarding its outbound sends.
///
/// spec.md §4.11 scopes the circuit breaker per outbound channel — a
/// Telegram long-poll wedged behind a proxy shouldn't trip the breaker a
/// healthy Slack socket-mode connection is relying on, so each adapter gets
/// its own [`ChannelCircuitBreaker`] rather than the manager sharing one
/// across every registered channel.
struct Registered {
    channel: Box<dyn Channel + Send + Sync>,
    breaker: ChannelCircuitBreaker,
}

/// Owns every channel adapter a supervised run is configured to speak
/// through, reconnecting each with exponential backoff and jitter and
/// guarding its sends with a dedicated circuit breaker.
pub struct ChannelManager {
    channels: HashMap<String, Registered>,
}

impl ChannelManager {
    /// Create an empty manager with no registered channels.
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel adapter under its own [`ChannelCircuitBreaker`].
    ///
    /// If a channel with the same name is already registered it is replaced,
    /// and its existing breaker state is discarded along with it.
    pub fn register(&mut self, channel: Box<dyn Channel + Send + Sync>) {
        let name = channel.name().to_string();
        info!(channel = %name, "registering channel adapter");
        self.channels.insert(
            name,
            Registered {
                channel,
                breaker: ChannelCircuitBreaker::default(),
            },
        );
    }

    /// Connect all registered channels.
    ///
    /// Each channel is connected sequentially. On failure, exponential
    /// backoff with jitter is applied up to [`MAX_CONNECT_ATTEMPTS`] times
    /// before the error is logged and the channel is skipped — a dead
    /// channel at startup should not block the ones that came up cleanly.
    pub async fn connect_all(&mut self) {
        for (name, reg) in self.channels.iter_mut() {
            info!(channel = %name, "connecting channel");
            if let Err(e) = connect_with_backoff(name, reg.channel.as_mut()).await {
                error!(channel = %name, error = %e, "failed to connect channel after retries");
            }
        }
    }

    /// Disconnect all registered channels.
    ///
    /// Errors are logged but do not abort disconnection of remaining channels.
    pub async fn disconnect_all(&mut self) {
        for (name, reg) in self.channels.iter_mut() {
            info!(channel = %name, "disconnecting channel");
            if let Err(e) = reg.channel.disconnect().await {
                warn!(channel = %name, error = %e, "error while disconnecting channel");
            }
        }
    }

    /// Return an immutable reference to the named channel, if it exists.
    pub fn get(&self, name: &str) -> Option<&(dyn Channel + Send + Sync)> {
        self.channels.get(name).map(|reg| reg.channel.as_ref())
    }

    /// Send an out-of-band notice through the named channel, guarded by its
    /// circuit breaker — a channel with an open breaker fails fast instead
    /// of hammering a service that has already rejected several sends in a
    /// row.
    pub async fn notify_guarded(&self, name: &str, notification: &Notification) -> Result<(), ChannelError> {
        let reg = self.registered(name)?;
        reg.breaker.guarded_send(|| reg.channel.notify(notification)).await
    }

    /// Stream a chunk of supervised-process output through the named
    /// channel, guarded by its circuit breaker.
    pub async fn send_output_guarded(&self, name: &str, chunk: &OutputChunk) -> Result<(), ChannelError> {
        let reg = self.registered(name)?;
        reg.breaker.guarded_send(|| reg.channel.send_output(chunk)).await
    }

    /// Return the current [`ChannelStatus`] for every registered channel.
    ///
    /// The returned `Vec` is sorted by channel name for deterministic output.
    pub fn statuses(&self) -> Vec<(String, ChannelStatus)> {
        let mut result: Vec<(String, ChannelStatus)> =
            self.channels.iter().map(|(name, reg)| (name.clone(), reg.channel.status())).collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Return the circuit-breaker health for every registered channel,
    /// sorted by name.
    pub fn breaker_health(&self) -> Vec<(String, CircuitBreakerHealth)> {
        let mut result: Vec<(String, CircuitBreakerHealth)> =
            self.channels.iter().map(|(name, reg)| (name.clone(), reg.breaker.health())).collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    fn registered(&self, name: &str) -> Result<&Registered, ChannelError> {
        self.channels.get(name).ok_or_else(|| ChannelError::Unavailable(format!("unknown channel {name}")))
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Attempt to connect a single channel with exponential backoff and ±10 % jitter.
///
/// Schedule: 5 s → 10 s → 20 s → … → 300 s (cap), up to [`MAX_CONNECT_ATTEMPTS`] tries.
async fn connect_with_backoff(name: &str, channel: &mut dyn Channel) -> Result<(), ChannelError> {
    let mut delay_secs = BACKOFF_BASE_SECS;

    for attempt in 1..=MAX_CONNECT_ATTEMPTS {
        match channel.connect().await {
            Ok(()) => {
                info!(channel = %name, attempt, "channel connected successfully");
                return Ok(());
            }
            Err(e) if attempt == MAX_CONNECT_ATTEMPTS => {
                return Err(e);
            }
            Err(e) => {
                let jitter = jitter_secs(delay_secs);
                let total = delay_secs + jitter;
                warn!(
                    channel = %name,
                    attempt,
                    max = MAX_CONNECT_ATTEMPTS,
                    error = %e,
                    retry_after_secs = total,
                    "channel connect failed, retrying with backoff"
                );
                sleep(Duration::from_secs(total)).await;
                delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
            }
        }
    }

    unreachable!("backoff loop exited without returning")
}

/// Return a jitter offset (0 … `JITTER_FRACTION * base_secs`) as integer seconds.
///
/// Uses a simple deterministic pseudo-random value derived from the current
/// monotonic timestamp, avoiding a rand dependency.
fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use relaybridge_core::reply::Reply;

    use super::*;
    use crate::types::{PromptDelivery, SentMessageRef};

    struct FlakyChannel {
        name: String,
        fail_connects: std::sync::atomic::AtomicU32,
        fail_sends: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl Channel for FlakyChannel {
        fn name(&self) -> &str {
            &self.name
        }

        async fn connect(&mut self) -> Result<(), ChannelError> {
            if self.fail_connects.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                self.fail_connects.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                return Err(ChannelError::ConnectionFailed("still flaky".to_string()));
            }
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn send_prompt(&self, _prompt: &PromptDelivery) -> Result<SentMessageRef, ChannelError> {
            unreachable!("not exercised by these tests")
        }

        async fn edit_prompt_message(&self, _message_ref: &SentMessageRef, _text: &str) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn send_output(&self, _chunk: &OutputChunk) -> Result<(), ChannelError> {
            if self.fail_sends.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                self.fail_sends.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                return Err(ChannelError::SendFailed("still flaky".to_string()));
            }
            Ok(())
        }

        async fn notify(&self, _notification: &Notification) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn receive_replies(&self) -> Result<Vec<Reply>, ChannelError> {
            Ok(Vec::new())
        }

        fn is_allowed(&self, _identity: &str) -> bool {
            true
        }

        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    fn flaky(name: &str, fail_connects: u32, fail_sends: u32) -> Box<FlakyChannel> {
        Box::new(FlakyChannel {
            name: name.to_string(),
            fail_connects: std::sync::atomic::AtomicU32::new(fail_connects),
            fail_sends: std::sync::atomic::AtomicU32::new(fail_sends),
        })
    }

    #[tokio::test]
    async fn connect_all_brings_up_healthy_channels() {
        let mut manager = ChannelManager::new();
        manager.register(flaky("telegram", 0, 0));
        manager.connect_all().await;
        assert!(matches!(manager.get("telegram").unwrap().status(), ChannelStatus::Connected));
    }

    #[test]
    fn jitter_never_exceeds_the_configured_fraction() {
        for base in [5, 10, 20, 40, 80, 160, 300] {
            let jitter = jitter_secs(base);
            assert!(jitter <= (base as f64 * JITTER_FRACTION) as u64);
        }
    }

    #[tokio::test]
    async fn each_channel_gets_its_own_breaker() {
        let mut manager = ChannelManager::new();
        manager.register(flaky("telegram", 0, 5));
        manager.register(flaky("slack", 0, 0));
        manager.connect_all().await;

        let chunk = OutputChunk { session_id: relaybridge_core::ids::SessionId::new(), channel: "telegram".to_string(), thread_id: None, text: String::new() };
        for _ in 0..3 {
            assert!(manager.send_output_guarded("telegram", &chunk).await.is_err());
        }
        let telegram_health = manager.breaker_health().into_iter().find(|(name, _)| name == "telegram").unwrap().1;
        assert!(telegram_health.open);

        let slack_chunk = OutputChunk { channel: "slack".to_string(), ..chunk };
        assert!(manager.send_output_guarded("slack", &slack_chunk).await.is_ok());
        let slack_health = manager.breaker_health().into_iter().find(|(name, _)| name == "slack").unwrap().1;
        assert!(!slack_health.open);
    }

    #[tokio::test]
    async fn guarded_send_against_unknown_channel_fails() {
        let manager = ChannelManager::new();
        let chunk = OutputChunk { session_id: relaybridge_core::ids::SessionId::new(), channel: "ghost".to_string(), thread_id: None, text: String::new() };
        assert!(manager.send_output_guarded("ghost", &chunk).await.is_err());
    }
}
