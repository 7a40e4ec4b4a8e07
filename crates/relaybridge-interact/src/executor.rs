//! Drives one injection attempt through to verified completion, retry, or
//! escalation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::warn;

use relaybridge_pty::Adapter;

use crate::error::{InteractError, Result};
use crate::plan::InteractionPlan;

/// Bridges the executor to a live `PtySupervisor` without a direct
/// dependency — implemented by the session-owning task.
#[async_trait]
pub trait InjectionSink: Send + Sync {
    async fn inject(&self, bytes: Vec<u8>) -> std::result::Result<(), String>;
    fn last_output_time(&self) -> Instant;
    fn mark_injected(&self);
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub injected_value: String,
    pub cli_advanced: bool,
    pub retries_used: u32,
    pub escalated: bool,
    pub feedback_message: String,
}

pub struct InteractionExecutor {
    pub dry_run: bool,
}

impl Default for InteractionExecutor {
    fn default() -> Self {
        Self { dry_run: false }
    }
}

impl InteractionExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub async fn execute(
        &self,
        plan: &InteractionPlan,
        value: &str,
        adapter: &dyn Adapter,
        sink: &dyn InjectionSink,
        notify: &(dyn Fn(&str) + Send + Sync),
    ) -> ExecutionResult {
        let display_value = if plan.suppress_value {
            "[REDACTED]".to_string()
        } else {
            value.to_string()
        };

        if self.dry_run {
            return ExecutionResult {
                success: true,
                injected_value: display_value.clone(),
                cli_advanced: false,
                retries_used: 0,
                escalated: false,
                feedback_message: format!("(dry run) would send: {display_value}"),
            };
        }

        let mut retries_used = 0u32;
        loop {
            let pre_inject_time = sink.last_output_time();
            let bytes = adapter.normalize(value, plan.append_cr);

            if let Err(e) = sink.inject(bytes).await {
                warn!("injection failed: {e}");
                return ExecutionResult {
                    success: false,
                    injected_value: display_value,
                    cli_advanced: false,
                    retries_used,
                    escalated: false,
                    feedback_message: format!("injection failed: {e}"),
                };
            }
            sink.mark_injected();

            let feedback = plan.display_template.replace("{value}", &display_value);

            if !plan.verify_advance {
                return ExecutionResult {
                    success: true,
                    injected_value: display_value,
                    cli_advanced: false,
                    retries_used,
                    escalated: false,
                    feedback_message: feedback,
                };
            }

            if check_advance(sink, pre_inject_time, plan.advance_timeout_s).await {
                return ExecutionResult {
                    success: true,
                    injected_value: display_value,
                    cli_advanced: true,
                    retries_used,
                    escalated: false,
                    feedback_message: feedback,
                };
            }

            if retries_used < plan.max_retries {
                retries_used += 1;
                notify(&plan.feedback_on_stall);
                tokio::time::sleep(Duration::from_secs_f64(plan.retry_delay_s)).await;
                continue;
            }

            if plan.escalate_on_exhaustion {
                notify(&plan.escalation_template);
                return ExecutionResult {
                    success: false,
                    injected_value: display_value,
                    cli_advanced: false,
                    retries_used,
                    escalated: true,
                    feedback_message: plan.escalation_template.clone(),
                };
            }

            return ExecutionResult {
                success: true,
                injected_value: display_value,
                cli_advanced: false,
                retries_used,
                escalated: false,
                feedback_message: format!("{feedback} {}", plan.feedback_on_stall),
            };
        }
    }

    /// Bypasses the classifier entirely: writes `value\r` and marks injected.
    /// No verification, no retries — used for free chat turns.
    pub async fn execute_chat_input(&self, value: &str, sink: &dyn InjectionSink) -> Result<ExecutionResult> {
        if self.dry_run {
            return Ok(ExecutionResult {
                success: true,
                injected_value: value.to_string(),
                cli_advanced: false,
                retries_used: 0,
                escalated: false,
                feedback_message: format!("(dry run) would send: \"{value}\""),
            });
        }

        let mut bytes = value.as_bytes().to_vec();
        bytes.push(b'\r');
        sink.inject(bytes)
            .await
            .map_err(InteractError::InjectionFailed)?;
        sink.mark_injected();
        Ok(ExecutionResult {
            success: true,
            injected_value: value.to_string(),
            cli_advanced: false,
            retries_used: 0,
            escalated: false,
            feedback_message: format!("Sent: \"{value}\""),
        })
    }
}

async fn check_advance(sink: &dyn InjectionSink, pre_inject_time: Instant, timeout_s: f64) -> bool {
    let echo_window = Duration::from_millis(relaybridge_detect::ECHO_SUPPRESS_MS);
    let deadline = Instant::now() + Duration::from_secs_f64(timeout_s);
    loop {
        if sink.last_output_time() > pre_inject_time + echo_window {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct FakeSink {
        last_output_nanos: AtomicU64,
        start: Instant,
        injected: Mutex<Vec<Vec<u8>>>,
    }

    impl FakeSink {
        fn new() -> Self {
            Self {
                last_output_nanos: AtomicU64::new(0),
                start: Instant::now(),
                injected: Mutex::new(Vec::new()),
            }
        }

        fn advance_output(&self) {
            let elapsed = self.start.elapsed().as_nanos() as u64;
            self.last_output_nanos.store(elapsed + 1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl InjectionSink for FakeSink {
        async fn inject(&self, bytes: Vec<u8>) -> std::result::Result<(), String> {
            self.injected.lock().unwrap().push(bytes);
            Ok(())
        }

        fn last_output_time(&self) -> Instant {
            self.start + Duration::from_nanos(self.last_output_nanos.load(Ordering::SeqCst))
        }

        fn mark_injected(&self) {
            self.advance_output();
        }
    }

    #[tokio::test]
    async fn dry_run_never_injects() {
        let executor = InteractionExecutor::new(true);
        let sink = FakeSink::new();
        let plan = crate::plan::build_plan(crate::classify::InteractionClass::YesNo);
        let adapter = relaybridge_pty::GenericAdapter;
        let result = executor
            .execute(&plan, "y", &adapter, &sink, &|_| {})
            .await;
        assert!(result.success);
        assert!(sink.injected.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_input_appends_cr_and_skips_verification() {
        let executor = InteractionExecutor::new(false);
        let sink = FakeSink::new();
        let result = executor.execute_chat_input("hello", &sink).await.unwrap();
        assert!(result.success);
        assert_eq!(sink.injected.lock().unwrap()[0], b"hello\r");
    }
}
