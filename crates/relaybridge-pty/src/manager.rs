//! `PtySupervisor` — one per session, owns four concurrent tasks plus the
//! raw [`crate::session::PtySession`]: pty reader, stdin relay, stall
//! watchdog, and response consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relaybridge_core::SessionId;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::error::{PtyError, Result};
use crate::session::PtySession;
use crate::types::{SpawnSpec, GRACEFUL_STOP_TIMEOUT_MS, STALL_WATCHDOG_INTERVAL_MS};

/// Hook the detector/output-forwarder implement to observe a session's output
/// stream without `relaybridge-pty` depending on `relaybridge-detect` directly.
pub trait OutputSink: Send + Sync + 'static {
    fn on_chunk(&self, data: &[u8]);
    fn on_silence_tick(&self);
    fn on_injected(&self);
}

/// Bytes queued for injection into the child's stdin, drained by the response
/// consumer task. Every entry must already be fully normalized (CR appended
/// if needed) by the caller (`relaybridge-interact`'s executor).
pub struct InjectCommand(pub Vec<u8>);

pub struct PtySupervisor {
    pub session_id: SessionId,
    pty: Arc<PtySession>,
    inject_tx: mpsc::Sender<InjectCommand>,
    stdin_relay_enabled: Arc<AtomicBool>,
    tasks: JoinSet<()>,
}

impl PtySupervisor {
    /// Spawn the child and start the four per-session tasks.
    #[instrument(skip(spec, sink), fields(session_id = %session_id))]
    pub fn start(
        session_id: SessionId,
        spec: SpawnSpec,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self> {
        let (pty, mut output_rx) = PtySession::spawn(&spec)?;
        let pty = Arc::new(pty);
        let (inject_tx, mut inject_rx) = mpsc::channel::<InjectCommand>(64);
        let stdin_relay_enabled = Arc::new(AtomicBool::new(false));

        let mut tasks = JoinSet::new();

        // 1. PTY reader — forwards chunks to the sink (detector + output forwarder).
        {
            let sink = Arc::clone(&sink);
            tasks.spawn(async move {
                while let Some(chunk) = output_rx.recv().await {
                    sink.on_chunk(&chunk);
                }
            });
        }

        // 2. Stdin relay — passthrough only while foreground-attached. The
        // actual operator-input channel is wired up by the CLI when it
        // attaches; until then this task just idles on an empty channel.
        {
            let pty = Arc::clone(&pty);
            let enabled = Arc::clone(&stdin_relay_enabled);
            let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(16);
            drop(stdin_tx);
            tasks.spawn(async move {
                while let Some(bytes) = stdin_rx.recv().await {
                    if enabled.load(Ordering::Acquire) {
                        if let Err(e) = pty.write(&bytes) {
                            warn!("stdin relay write failed: {e}");
                        }
                    }
                }
            });
        }

        // 3. Stall watchdog — ticks the detector's silence check every second.
        {
            let sink = Arc::clone(&sink);
            let pty = Arc::clone(&pty);
            tasks.spawn(async move {
                let mut interval =
                    tokio::time::interval(Duration::from_millis(STALL_WATCHDOG_INTERVAL_MS));
                loop {
                    interval.tick().await;
                    if !pty.is_alive() {
                        break;
                    }
                    sink.on_silence_tick();
                }
            });
        }

        // 4. Response consumer — drains the injection queue.
        {
            let pty = Arc::clone(&pty);
            let sink = Arc::clone(&sink);
            tasks.spawn(async move {
                while let Some(InjectCommand(bytes)) = inject_rx.recv().await {
                    if let Err(e) = pty.write(&bytes) {
                        warn!("injection write failed: {e}");
                        continue;
                    }
                    sink.on_injected();
                }
            });
        }

        Ok(Self {
            session_id,
            pty,
            inject_tx,
            stdin_relay_enabled,
            tasks,
        })
    }

    pub fn inject_sender(&self) -> mpsc::Sender<InjectCommand> {
        self.inject_tx.clone()
    }

    pub fn set_stdin_relay(&self, enabled: bool) {
        self.stdin_relay_enabled.store(enabled, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.pty.is_alive()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pty.pid()
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        self.pty.resize(cols, rows)
    }

    /// SIGTERM, wait up to 5s, SIGKILL if still alive, then cancel and await
    /// all four per-session tasks.
    #[cfg(unix)]
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn stop(mut self) -> Result<()> {
        use nix::sys::signal::Signal;

        if !self.pty.is_alive() {
            self.tasks.shutdown().await;
            return Err(PtyError::AlreadyStopped);
        }

        self.pty.send_signal(Signal::SIGTERM)?;

        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(GRACEFUL_STOP_TIMEOUT_MS);
        while self.pty.is_alive() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        if self.pty.is_alive() {
            self.pty.send_signal(Signal::SIGKILL)?;
            self.tasks.shutdown().await;
            return Err(PtyError::StopTimedOut {
                ms: GRACEFUL_STOP_TIMEOUT_MS,
            });
        }

        self.tasks.shutdown().await;
        info!("session stopped cleanly");
        Ok(())
    }

    #[cfg(unix)]
    pub fn pause(&self) -> Result<()> {
        self.pty.send_signal(nix::sys::signal::Signal::SIGSTOP)
    }

    #[cfg(unix)]
    pub fn resume(&self) -> Result<()> {
        self.pty.send_signal(nix::sys::signal::Signal::SIGCONT)
    }

    #[cfg(not(unix))]
    pub fn pause(&self) -> Result<()> {
        Err(PtyError::PauseUnavailable)
    }

    #[cfg(not(unix))]
    pub fn resume(&self) -> Result<()> {
        Err(PtyError::PauseUnavailable)
    }
}
