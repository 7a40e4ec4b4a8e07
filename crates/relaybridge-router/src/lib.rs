#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Pure channel-gate evaluation, single-use nonce tracking, and the
//! forward/return-path orchestration that wires policy decisions to channel
//! sends and session/conversation bookkeeping.

pub mod error;
pub mod forward;
pub mod gate;
pub mod nonce;
pub mod return_path;

pub use error::{Result, RouterError};
pub use forward::{route_prompt, AutopilotSink, ForwardOutcome};
pub use gate::{evaluate_gate, GateAction, GateContext, GateDecision, GateRejectReason};
pub use nonce::NonceStore;
pub use return_path::{accept_reply, finalize_reply, AcceptedReply};
