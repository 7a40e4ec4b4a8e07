//! Raw PTY wrapper: owns the pseudo-terminal pair and the spawned child.
//!
//! Generalizes the teacher's single-session, buffer-draining design into a
//! streaming one: a background OS thread forwards each raw chunk to a tokio
//! channel immediately instead of accumulating it, since sanitization and
//! prompt detection (`relaybridge-detect`) need to see output incrementally.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{PtyError, Result};
use crate::types::SpawnSpec;

/// Bytes read from the child, pushed to the consumer as soon as they arrive.
pub type OutputChunk = Vec<u8>;

pub struct PtySession {
    writer: Mutex<Box<dyn Write + Send>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    alive: Arc<AtomicBool>,
    pid: Option<u32>,
}

impl PtySession {
    /// Spawn the child described by `spec` inside a new PTY. Returns the
    /// session handle plus a receiver that yields raw output chunks until EOF.
    pub fn spawn(spec: &SpawnSpec) -> Result<(Self, mpsc::Receiver<OutputChunk>)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: spec.rows,
                cols: spec.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let Some((program, args)) = spec.argv.split_first() else {
            return Err(PtyError::Spawn("argv must not be empty".to_string()));
        };
        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.cwd(&spec.cwd);
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        let pid = child.process_id();

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let alive = Arc::new(AtomicBool::new(true));
        let alive_clone = Arc::clone(&alive);
        let (tx, rx) = mpsc::channel::<OutputChunk>(256);

        // Blocking I/O runs on a dedicated OS thread so it never blocks tokio.
        std::thread::spawn(move || {
            let mut raw = [0u8; 4096];
            loop {
                match reader.read(&mut raw) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(raw[..n].to_vec()).is_err() {
                            break; // receiver dropped, session torn down elsewhere
                        }
                    }
                    Err(e) => {
                        warn!("pty reader error: {e}");
                        break;
                    }
                }
            }
            alive_clone.store(false, Ordering::Release);
            debug!("pty reader thread exited");
        });

        Ok((
            Self {
                writer: Mutex::new(writer),
                master: Mutex::new(pair.master),
                child: Mutex::new(child),
                alive,
                pid,
            },
            rx,
        ))
    }

    /// Write raw bytes to the child's stdin. Callers are responsible for
    /// terminating injected replies with `\r`, never `\n`.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        guard.write_all(bytes)?;
        guard.flush()?;
        Ok(())
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let guard = self.master.lock().unwrap_or_else(|p| p.into_inner());
        guard
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Spawn(e.to_string()))
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking exit-status poll. `Some` once the child has exited.
    pub fn try_wait_exit_code(&self) -> Option<i32> {
        let mut guard = self.child.lock().unwrap_or_else(|p| p.into_inner());
        guard
            .try_wait()
            .ok()
            .flatten()
            .map(|status| status.exit_code() as i32)
    }

    #[cfg(unix)]
    pub fn send_signal(&self, signal: nix::sys::signal::Signal) -> Result<()> {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return Err(PtyError::Spawn("no pid available".to_string()));
        };
        kill(Pid::from_raw(pid as i32), signal)
            .map_err(|e| PtyError::Spawn(format!("signal failed: {e}")))
    }
}
