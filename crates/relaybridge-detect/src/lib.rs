#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Output sanitization, tri-signal prompt detection, and secret redaction.

pub mod detector;
pub mod patterns;
pub mod redact;
pub mod sanitize;

pub use detector::{DetectionSignal, PromptDetector, ECHO_SUPPRESS_MS};
pub use redact::{redact, redact_labeled};
pub use sanitize::sanitize;
