#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! `relaybridge-pty` — launches an interactive CLI agent inside a
//! pseudo-terminal and supervises its lifetime.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use relaybridge_core::SessionId;
//! use relaybridge_pty::manager::{OutputSink, PtySupervisor};
//! use relaybridge_pty::types::SpawnSpec;
//!
//! struct NoopSink;
//! impl OutputSink for NoopSink {
//!     fn on_chunk(&self, _data: &[u8]) {}
//!     fn on_silence_tick(&self) {}
//!     fn on_injected(&self) {}
//! }
//!
//! # async fn run() -> relaybridge_pty::Result<()> {
//! let spec = SpawnSpec::new(vec!["bash".into()], "/tmp");
//! let supervisor = PtySupervisor::start(SessionId::new(), spec, Arc::new(NoopSink))?;
//! supervisor.resize(100, 40)?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod error;
pub mod manager;
pub mod session;
pub mod types;

pub use adapter::{resolve_adapter, Adapter, GenericAdapter, ClaudeCodeAdapter};
pub use error::{PtyError, Result};
pub use manager::{InjectCommand, OutputSink, PtySupervisor};
pub use types::SpawnSpec;
