//! Wires together every library crate for `relaybridge run`: spawns the
//! child under `relaybridge-pty`, drives detection and policy evaluation on
//! its output, forwards prompts the policy won't auto-answer to whichever
//! channel is configured, and injects the eventual reply back in.
//!
//! This is the one place in the workspace that owns a live session end to
//! end — every other crate only sees the pieces passed to it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{info, warn};

use relaybridge_audit::AuditWriter;
use relaybridge_channels::{Channel, ChannelManager, Notification, NotifyLevel};
use relaybridge_core::config::RelaybridgeConfig;
use relaybridge_core::conversation::ConversationState;
use relaybridge_core::ids::SessionId;
use relaybridge_core::prompt::{PromptEvent, PromptStateMachine};
use relaybridge_core::session::{Session, SessionStatus};
use relaybridge_detect::{redact, sanitize, PromptDetector};
use relaybridge_interact::{build_plan, classify_fused, Fuser, InjectionSink, InteractionExecutor, NoopFuser};
use relaybridge_policy::{evaluate, EvalEvent};
use relaybridge_pty::manager::{InjectCommand, OutputSink, PtySupervisor};
use relaybridge_pty::types::SpawnSpec;
use relaybridge_pty::{resolve_adapter, Adapter};
use relaybridge_router::{
    accept_reply, evaluate_gate, finalize_reply, route_prompt, AutopilotSink, ForwardOutcome, GateContext, NonceStore,
};
use relaybridge_sessions::{ConversationRegistry, SessionManager};

const THREAD_ID: &str = "default";
const REPLY_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub async fn run(config: RelaybridgeConfig, tool: String, args: Vec<String>, dry_run: bool) -> Result<i32> {
    let cwd = std::env::current_dir()?.to_string_lossy().into_owned();

    let boxed_channel: Box<dyn Channel + Send + Sync> = build_channel(&config)?;
    let channel_name = boxed_channel.name().to_string();

    let mut channel_manager = ChannelManager::new();
    channel_manager.register(boxed_channel);
    channel_manager.connect_all().await;
    let channel: &dyn Channel = channel_manager
        .get(&channel_name)
        .context("channel manager lost its only registered channel")?;

    let sessions_conn = rusqlite::Connection::open(&config.database.path)
        .with_context(|| format!("opening {}", config.database.path))?;
    let sessions = SessionManager::new(sessions_conn)?;

    let audit_conn = rusqlite::Connection::open(&config.database.path)?;
    let audit = AuditWriter::new(audit_conn)?;

    let policy = match &config.policy.path {
        Some(path) => relaybridge_policy::load_policy(path).with_context(|| format!("loading policy {path}"))?,
        None => relaybridge_policy::default_policy(),
    };

    let mut session = Session::new(tool.clone(), args.clone(), cwd.clone());
    session.transition(SessionStatus::Starting)?;
    sessions.create(&session)?;
    audit.session_started(session.session_id.clone(), &tool, args.clone(), &cwd)?;

    let conversations = Arc::new(ConversationRegistry::new());
    conversations.bind(&channel_name, THREAD_ID, session.session_id.clone());
    let nonces = Arc::new(NonceStore::new());

    let mut argv = vec![tool.clone()];
    argv.extend(args);
    let spec = SpawnSpec::new(argv, cwd);

    let (chunk_tx, mut chunk_rx) = mpsc::channel::<Vec<u8>>(256);
    let sink = Arc::new(ChunkForwarder {
        tx: chunk_tx,
        last_output_ms: Arc::new(AtomicU64::new(now_ms())),
        injected: Arc::new(AtomicBool::new(false)),
    });

    let supervisor = PtySupervisor::start(session.session_id.clone(), spec, sink.clone())
        .context("spawning the supervised child")?;

    session.pid = supervisor.pid();
    session.transition(SessionStatus::Running)?;
    sessions.save(&session)?;
    conversations.transition(&channel_name, THREAD_ID, ConversationState::Running).ok();

    let injection_sink = Arc::new(LiveInjectionSink {
        inject_tx: supervisor.inject_sender(),
        last_output_ms: sink.last_output_ms.clone(),
        injected: sink.injected.clone(),
    });
    let adapter: Arc<dyn Adapter> = Arc::from(resolve_adapter(&tool));
    let executor = Arc::new(InteractionExecutor::new(dry_run));
    // No ML classifier is wired up yet — `NoopFuser` passes the deterministic
    // classification through unchanged until one is.
    let fuser: Arc<dyn Fuser> = Arc::new(NoopFuser);

    let active_prompt: Arc<Mutex<Option<PromptEvent>>> = Arc::new(Mutex::new(None));
    let active_state_machine: Arc<Mutex<Option<PromptStateMachine>>> = Arc::new(Mutex::new(None));
    let active_message_ref: Arc<Mutex<Option<relaybridge_channels::SentMessageRef>>> = Arc::new(Mutex::new(None));

    let autopilot = CliAutopilot {
        executor: executor.clone(),
        adapter: adapter.clone(),
        sink: injection_sink.clone(),
        active_prompt: active_prompt.clone(),
        channel,
        channel_name: channel_name.clone(),
        fuser: fuser.clone(),
    };

    let mut detector = PromptDetector::new();
    let prompt_timeout = config.prompts.timeout_seconds as i64;

    loop {
        tokio::select! {
            chunk = chunk_rx.recv() => {
                let Some(chunk) = chunk else { break };
                let text = sanitize(&chunk);
                if let Some(signal) = detector.analyse(&chunk, !supervisor.is_alive()) {
                    info!(prompt_type = ?signal.prompt_type, "prompt detected");
                    let prompt = PromptEvent::new(
                        session.session_id.clone(),
                        signal.prompt_type,
                        signal.confidence,
                        &signal.excerpt,
                        signal.choices.clone(),
                        prompt_timeout,
                    );
                    audit.prompt_detected(
                        session.session_id.clone(),
                        prompt.prompt_id.clone(),
                        &format!("{:?}", prompt.prompt_type),
                        &format!("{:?}", prompt.confidence),
                        &redact(&prompt.excerpt),
                    )?;

                    let session_cwd = session.cwd.clone();
                    let event = EvalEvent {
                        tool_id: &tool,
                        cwd: &session_cwd,
                        prompt_type: prompt.prompt_type,
                        confidence: prompt.confidence,
                        excerpt: &prompt.excerpt,
                        session_tag: None,
                        session_state: None,
                        channel_message: false,
                        environment: None,
                    };

                    *active_prompt.lock().unwrap_or_else(|p| p.into_inner()) = Some(prompt.clone());
                    *active_state_machine.lock().unwrap_or_else(|p| p.into_inner()) =
                        Some(PromptStateMachine::new(prompt.prompt_id.clone()));

                    let decision = evaluate(&policy, &event)?;
                    audit.prompt_routed(
                        session.session_id.clone(),
                        prompt.prompt_id.clone(),
                        &channel_name,
                        &decision.policy_hash,
                        &format!("{:?}", decision.action),
                    )?;

                    let outcome = route_prompt(
                        &policy,
                        &event,
                        prompt.clone(),
                        &mut session,
                        channel,
                        &channel_name,
                        THREAD_ID,
                        &sessions,
                        &conversations,
                        &autopilot,
                    )
                    .await?;

                    if let ForwardOutcome::Dispatched { message_id } = outcome {
                        *active_message_ref.lock().unwrap_or_else(|p| p.into_inner()) =
                            Some(relaybridge_channels::SentMessageRef {
                                channel: channel_name.clone(),
                                message_id,
                                thread_id: Some(THREAD_ID.to_string()),
                            });
                    }
                } else if !text.trim().is_empty() {
                    let _ = channel_manager
                        .send_output_guarded(
                            &channel_name,
                            &relaybridge_channels::OutputChunk {
                                session_id: session.session_id.clone(),
                                channel: channel_name.clone(),
                                thread_id: Some(THREAD_ID.to_string()),
                                text: redact(&text),
                            },
                        )
                        .await;
                }
            }

            replies = channel.receive_replies(), if supervisor.is_alive() => {
                match replies {
                    Ok(replies) => {
                        for reply in replies {
                            if let Err(e) = handle_reply(
                                &reply,
                                &active_prompt,
                                &active_state_machine,
                                &active_message_ref,
                                channel,
                                &channel_name,
                                &nonces,
                                &sessions,
                                &conversations,
                                &mut session,
                                &adapter,
                                &executor,
                                &injection_sink,
                                &audit,
                                &fuser,
                            )
                            .await
                            {
                                warn!("reply handling failed: {e}");
                            }
                        }
                    }
                    Err(e) => {
                        audit.channel_polling_failed(&channel_name, &e.to_string())?;
                    }
                }
            }

            _ = tokio::time::sleep(REPLY_POLL_INTERVAL), if !supervisor.is_alive() => {
                break;
            }
        }

        if !supervisor.is_alive() {
            break;
        }
    }

    // The loop only reaches here once the child has already exited, so
    // `stop` finds nothing left to signal and reports `AlreadyStopped` —
    // that's the expected clean-exit path, not a failure.
    let exit_code = match supervisor.stop().await {
        Ok(()) | Err(relaybridge_pty::PtyError::AlreadyStopped) => 0,
        Err(_) => 1,
    };
    session.transition(SessionStatus::Completed).or_else(|_| session.transition(SessionStatus::Crashed)).ok();
    sessions.save(&session)?;
    audit.session_ended(session.session_id.clone(), "child exited", Some(exit_code))?;
    conversations.transition(&channel_name, THREAD_ID, ConversationState::Stopped).ok();
    channel_manager.disconnect_all().await;

    Ok(exit_code)
}

fn now_ms() -> u64 {
    Instant::now().elapsed().as_millis() as u64
}

fn build_channel(config: &RelaybridgeConfig) -> Result<Box<dyn Channel + Send + Sync>> {
    if let Some(tg) = &config.channels.telegram {
        return Ok(Box::new(relaybridge_telegram::TelegramChannel::new(tg)));
    }
    if let Some(slack) = &config.channels.slack {
        return Ok(Box::new(relaybridge_slack::SlackChannel::new(slack)));
    }
    bail!("no channel configured — set [channels.telegram] or [channels.slack]")
}

/// Forwards PTY output chunks into the detection loop's channel and tracks
/// the timestamps `LiveInjectionSink` needs for stall detection.
struct ChunkForwarder {
    tx: mpsc::Sender<Vec<u8>>,
    last_output_ms: Arc<AtomicU64>,
    injected: Arc<AtomicBool>,
}

impl OutputSink for ChunkForwarder {
    fn on_chunk(&self, data: &[u8]) {
        self.last_output_ms.store(now_ms(), Ordering::Release);
        let _ = self.tx.try_send(data.to_vec());
    }

    fn on_silence_tick(&self) {}

    fn on_injected(&self) {
        self.injected.store(true, Ordering::Release);
    }
}

/// Bridges `relaybridge-interact`'s executor to the live `PtySupervisor`
/// through its injection channel, without this crate depending on
/// `relaybridge-pty`'s session internals directly.
struct LiveInjectionSink {
    inject_tx: mpsc::Sender<InjectCommand>,
    last_output_ms: Arc<AtomicU64>,
    injected: Arc<AtomicBool>,
}

#[async_trait]
impl InjectionSink for LiveInjectionSink {
    async fn inject(&self, bytes: Vec<u8>) -> std::result::Result<(), String> {
        self.inject_tx.send(InjectCommand(bytes)).await.map_err(|e| e.to_string())
    }

    fn last_output_time(&self) -> Instant {
        // InjectionSink's contract only needs a comparable instant, not the
        // literal spawn-relative value `ChunkForwarder` stores.
        Instant::now() - Duration::from_millis(now_ms().saturating_sub(self.last_output_ms.load(Ordering::Acquire)))
    }

    fn mark_injected(&self) {
        self.injected.store(true, Ordering::Release);
    }
}

/// Executes policy-decided outcomes that never need a human round trip.
/// `auto_reply` re-derives the interaction plan from whichever `PromptEvent`
/// the forward-path loop just evaluated — `AutopilotSink`'s trait methods
/// only carry a session id and a value, so the active prompt is threaded in
/// through shared state rather than the trait signature.
struct CliAutopilot<'a> {
    executor: Arc<InteractionExecutor>,
    adapter: Arc<dyn Adapter>,
    sink: Arc<LiveInjectionSink>,
    active_prompt: Arc<Mutex<Option<PromptEvent>>>,
    channel: &'a dyn Channel,
    channel_name: String,
    fuser: Arc<dyn Fuser>,
}

#[async_trait]
impl<'a> AutopilotSink for CliAutopilot<'a> {
    async fn auto_reply(&self, _session_id: &SessionId, value: &str) -> std::result::Result<(), String> {
        let class = {
            let guard = self.active_prompt.lock().unwrap_or_else(|p| p.into_inner());
            match guard.as_ref() {
                Some(prompt) => classify_fused(prompt, self.fuser.as_ref(), None).class,
                None => return Err("auto_reply called with no active prompt".to_string()),
            }
        };
        let plan = build_plan(class);
        let noop = |_msg: &str| {};
        let result = self
            .executor
            .execute(&plan, value, self.adapter.as_ref(), self.sink.as_ref(), &noop)
            .await;
        if result.success {
            Ok(())
        } else {
            Err(result.feedback_message)
        }
    }

    async fn notify(&self, session_id: &SessionId, message: &str) {
        let _ = self
            .channel
            .notify(&Notification {
                session_id: Some(session_id.clone()),
                channel: self.channel_name.clone(),
                thread_id: Some(THREAD_ID.to_string()),
                level: NotifyLevel::Info,
                text: redact(message),
            })
            .await;
    }

    async fn deny(&self, session_id: &SessionId, reason: &str) {
        let _ = self
            .channel
            .notify(&Notification {
                session_id: Some(session_id.clone()),
                channel: self.channel_name.clone(),
                thread_id: Some(THREAD_ID.to_string()),
                level: NotifyLevel::Warning,
                text: format!("denied: {}", redact(reason)),
            })
            .await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_reply(
    reply: &relaybridge_core::reply::Reply,
    active_prompt: &Arc<Mutex<Option<PromptEvent>>>,
    active_state_machine: &Arc<Mutex<Option<PromptStateMachine>>>,
    active_message_ref: &Arc<Mutex<Option<relaybridge_channels::SentMessageRef>>>,
    channel: &dyn Channel,
    channel_name: &str,
    nonces: &NonceStore,
    sessions: &SessionManager,
    conversations: &ConversationRegistry,
    session: &mut Session,
    adapter: &Arc<dyn Adapter>,
    executor: &Arc<InteractionExecutor>,
    sink: &Arc<LiveInjectionSink>,
    audit: &AuditWriter,
    fuser: &Arc<dyn Fuser>,
) -> Result<()> {
    let prompt = {
        let guard = active_prompt.lock().unwrap_or_else(|p| p.into_inner());
        guard.clone()
    };
    let Some(prompt) = prompt else {
        return Ok(());
    };

    let mut state_machine = {
        let guard = active_state_machine.lock().unwrap_or_else(|p| p.into_inner());
        match guard.clone() {
            Some(sm) => sm,
            None => return Ok(()),
        }
    };

    let class = classify_fused(&prompt, fuser.as_ref(), None).class;

    let allowlisted = reply
        .channel_identity
        .split()
        .map(|(identity_channel, user_id)| identity_channel == channel_name && channel.is_allowed(user_id))
        .unwrap_or(false);
    let gate_ctx = GateContext {
        allowlisted,
        session_bound: true,
        conversation_state: conversations.state(channel_name, THREAD_ID),
        policy_allows_interrupt: false,
        has_active_prompt: true,
        prompt_expired: prompt.is_expired(Utc::now()),
        interaction_class: Some(class),
        policy_allows_chat_turns: false,
    };
    if let Err(reason) = evaluate_gate(&gate_ctx).outcome {
        warn!(reason = reason.code(), "reply rejected at the channel gate");
        let _ = channel
            .notify(&Notification {
                session_id: Some(session.session_id.clone()),
                channel: channel_name.to_string(),
                thread_id: Some(THREAD_ID.to_string()),
                level: NotifyLevel::Warning,
                text: reason.message().to_string(),
            })
            .await;
        return Ok(());
    }

    let accepted = accept_reply(reply, &prompt, &mut state_machine, channel, channel_name, nonces)?;
    audit.reply_received(
        session.session_id.clone(),
        prompt.prompt_id.clone(),
        channel_name,
        reply.channel_identity.as_str(),
    )?;
    let plan = build_plan(class);
    let noop = |_msg: &str| {};
    let result = executor
        .execute(&plan, &accepted.value, adapter.as_ref(), sink.as_ref(), &noop)
        .await;
    audit.response_injected(session.session_id.clone(), prompt.prompt_id.clone(), accepted.value.len())?;

    let message_ref = {
        let guard = active_message_ref.lock().unwrap_or_else(|p| p.into_inner());
        guard.clone()
    };
    let Some(message_ref) = message_ref else {
        return Ok(());
    };

    let display_value: &str = if plan.suppress_value { "[REDACTED]" } else { result.injected_value.as_str() };
    let next_queued = finalize_reply(
        &mut state_machine,
        session,
        &message_ref,
        display_value,
        channel,
        channel_name,
        THREAD_ID,
        sessions,
        conversations,
    )
    .await?;

    *active_prompt.lock().unwrap_or_else(|p| p.into_inner()) = next_queued;
    *active_state_machine.lock().unwrap_or_else(|p| p.into_inner()) = None;
    *active_message_ref.lock().unwrap_or_else(|p| p.into_inner()) = None;

    Ok(())
}
