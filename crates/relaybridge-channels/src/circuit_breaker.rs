use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Default number of consecutive failures before the breaker trips.
const DEFAULT_THRESHOLD: u32 = 3;
/// Default cooldown before a tripped breaker resets itself.
const DEFAULT_RECOVERY_SECS: f64 = 30.0;

/// Snapshot of breaker state for a `healthcheck()`-style report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerHealth {
    pub open: bool,
    pub failures: u32,
}

struct State {
    failures: u32,
    tripped_at: Option<Instant>,
}

/// Trips after `threshold` consecutive send failures and stays open until
/// `recovery_seconds` have elapsed, at which point the next call is let
/// through and failures reset. No half-open probe state — a single
/// failure-after-cooldown simply re-trips for another full cooldown.
pub struct ChannelCircuitBreaker {
    threshold: u32,
    recovery_seconds: f64,
    state: Mutex<State>,
}

impl ChannelCircuitBreaker {
    pub fn new(threshold: u32, recovery_seconds: f64) -> Self {
        Self {
            threshold,
            recovery_seconds,
            state: Mutex::new(State {
                failures: 0,
                tripped_at: None,
            }),
        }
    }

    /// Whether the breaker is currently blocking sends. Auto-clears once
    /// `recovery_seconds` have elapsed since it tripped.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        match state.tripped_at {
            Some(tripped_at) => {
                if tripped_at.elapsed() >= Duration::from_secs_f64(self.recovery_seconds) {
                    state.tripped_at = None;
                    state.failures = 0;
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.failures += 1;
        if state.failures >= self.threshold {
            state.tripped_at = Some(Instant::now());
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.failures = 0;
        state.tripped_at = None;
    }

    pub fn health(&self) -> CircuitBreakerHealth {
        let open = self.is_open();
        let failures = self.state.lock().unwrap_or_else(|p| p.into_inner()).failures;
        CircuitBreakerHealth { open, failures }
    }

    /// Run `send` unless the breaker is open, tracking failures/successes
    /// around it. Mirrors a channel adapter's guarded-send wrapper.
    pub async fn guarded_send<F, Fut, T>(&self, send: F) -> Result<T, ChannelError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ChannelError>>,
    {
        if self.is_open() {
            return Err(ChannelError::Unavailable("circuit breaker open".to_string()));
        }

        match send().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }
}

impl Default for ChannelCircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_RECOVERY_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok() -> Result<(), ChannelError> {
        Ok(())
    }

    async fn fail() -> Result<(), ChannelError> {
        Err(ChannelError::SendFailed("boom".to_string()))
    }

    #[tokio::test]
    async fn trips_after_threshold_consecutive_failures() {
        let breaker = ChannelCircuitBreaker::new(3, 30.0);
        for _ in 0..2 {
            assert!(breaker.guarded_send(fail).await.is_err());
            assert!(!breaker.is_open());
        }
        assert!(breaker.guarded_send(fail).await.is_err());
        assert!(breaker.is_open());
    }

    #[tokio::test]
    async fn open_breaker_rejects_without_calling_send() {
        let breaker = ChannelCircuitBreaker::new(1, 30.0);
        assert!(breaker.guarded_send(fail).await.is_err());
        assert!(breaker.is_open());

        let result = breaker.guarded_send(ok).await;
        assert!(matches!(result, Err(ChannelError::Unavailable(_))));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = ChannelCircuitBreaker::new(3, 30.0);
        assert!(breaker.guarded_send(fail).await.is_err());
        assert!(breaker.guarded_send(ok).await.is_ok());
        assert_eq!(breaker.health().failures, 0);
    }

    #[tokio::test]
    async fn recovers_after_cooldown_elapses() {
        let breaker = ChannelCircuitBreaker::new(1, 0.01);
        assert!(breaker.guarded_send(fail).await.is_err());
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!breaker.is_open());
        assert!(breaker.guarded_send(ok).await.is_ok());
    }

    #[test]
    fn health_reports_open_and_failure_count() {
        let breaker = ChannelCircuitBreaker::new(5, 30.0);
        breaker.record_failure();
        breaker.record_failure();
        let health = breaker.health();
        assert!(!health.open);
        assert_eq!(health.failures, 2);
    }
}
