#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! The hash-chained audit log, decision trace, workspace trust store, and
//! provider credential registry. Everything here is append-mostly and
//! single-writer: SQLite for the audit trail and workspace trust, a rotated
//! JSON-Lines file for the decision trace.

pub mod archive;
pub mod canon;
pub mod db;
pub mod error;
pub mod event;
pub mod provider;
pub mod trace;
pub mod trust;
pub mod verify;
pub mod writer;

pub use archive::archive_audit_events;
pub use error::{AuditError, Result};
pub use event::{AgentSorKind, AuditAction, AuditEvent};
pub use provider::{ProviderConfigRow, ProviderConfigStore};
pub use trace::{DecisionTraceEntry, DecisionTraceWriter};
pub use trust::WorkspaceTrustStore;
pub use verify::{verify_audit_integrity, IntegrityReport};
pub use writer::AuditWriter;
