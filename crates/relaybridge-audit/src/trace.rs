//! Append-only, hash-chained decision trace: one JSON line per policy
//! evaluation, independent of the SQLite audit log so a dashboard or
//! compliance export can tail it without touching the database.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canon::canonical_bytes;
use crate::error::{AuditError, Result};
use crate::verify::IntegrityReport;

const MAX_TRACE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_TRACE_ARCHIVES: u8 = 3;
const TRACE_VERSION: &str = "2";

fn trace_version() -> String {
    TRACE_VERSION.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTraceEntry {
    pub session_id: String,
    pub prompt_id: String,
    pub timestamp: DateTime<Utc>,
    pub policy_version: String,
    pub policy_hash: String,
    pub matched_rule: Option<String>,
    pub evaluation_details: serde_json::Value,
    pub risk_level: String,
    pub confidence: String,
    pub action_taken: String,
    pub idempotency_key: String,
    pub escalation_status: Option<String>,
    pub human_actor: Option<String>,
    pub ci_status_snapshot: Option<serde_json::Value>,
    pub replay_safe: bool,
    pub previous_hash: Option<String>,
    pub current_hash: Option<String>,
    #[serde(default = "trace_version")]
    pub trace_version: String,
}

impl DecisionTraceEntry {
    /// SHA-256 of the canonical entry with `current_hash` excluded — a
    /// field can't be part of its own hash.
    pub fn compute_hash(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.remove("current_hash");
        }
        Ok(hex::encode(Sha256::digest(canonical_bytes(&value)?)))
    }

    pub fn seal(&mut self, previous_hash: Option<String>) -> Result<()> {
        self.previous_hash = previous_hash;
        self.current_hash = None;
        self.current_hash = Some(self.compute_hash()?);
        Ok(())
    }
}

pub struct DecisionTraceWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DecisionTraceWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Seals `entry` against the current tail hash and appends it, rotating
    /// the file first if the write would push it past the size limit.
    pub fn append(&self, mut entry: DecisionTraceEntry) -> Result<DecisionTraceEntry> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let prev_hash = self.read_last_hash(&self.path)?;
        entry.seal(prev_hash)?;

        let line = format!("{}\n", serde_json::to_string(&entry)?);
        self.rotate_if_needed(line.len() as u64)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| AuditError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        file.write_all(line.as_bytes()).map_err(|source| AuditError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(entry)
    }

    fn read_last_hash(&self, path: &Path) -> Result<Option<String>> {
        let Ok(file) = std::fs::File::open(path) else {
            return Ok(None);
        };
        let mut last_line = None;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| AuditError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }
        match last_line {
            Some(line) => {
                let entry: DecisionTraceEntry = serde_json::from_str(&line)?;
                Ok(entry.current_hash)
            }
            None => Ok(None),
        }
    }

    fn rotate_if_needed(&self, incoming_bytes: u64) -> Result<()> {
        let current_size = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if current_size == 0 || current_size + incoming_bytes <= MAX_TRACE_BYTES {
            return Ok(());
        }

        let oldest = archive_path(&self.path, MAX_TRACE_ARCHIVES);
        if oldest.exists() {
            std::fs::remove_file(&oldest).map_err(|source| AuditError::Io {
                path: oldest.display().to_string(),
                source,
            })?;
        }
        for n in (1..MAX_TRACE_ARCHIVES).rev() {
            let from = archive_path(&self.path, n);
            let to = archive_path(&self.path, n + 1);
            if from.exists() {
                std::fs::rename(&from, &to).map_err(|source| AuditError::Io {
                    path: from.display().to_string(),
                    source,
                })?;
            }
        }
        std::fs::rename(&self.path, archive_path(&self.path, 1)).map_err(|source| AuditError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

fn archive_path(active_path: &Path, n: u8) -> PathBuf {
    let mut name = active_path.file_name().and_then(|s| s.to_str()).unwrap_or("trace.jsonl").to_string();
    name.push_str(&format!(".{n}"));
    active_path.with_file_name(name)
}

/// Walks archives oldest-first, then the active file, checking every entry's
/// self-hash and its link to the previous entry.
pub fn verify_chain(active_path: impl AsRef<Path>) -> Result<IntegrityReport> {
    let active_path = active_path.as_ref();
    let mut files: Vec<PathBuf> = (1..=MAX_TRACE_ARCHIVES)
        .rev()
        .map(|n| archive_path(active_path, n))
        .filter(|p| p.exists())
        .collect();
    files.push(active_path.to_path_buf());

    let mut checked: u64 = 0;
    let mut expected_prev: Option<String> = None;

    for path in files {
        let Ok(file) = std::fs::File::open(&path) else { continue };
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| AuditError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            checked += 1;
            let entry: DecisionTraceEntry = serde_json::from_str(&line)?;

            if entry.previous_hash != expected_prev {
                return Ok(broken(checked, &entry, "previous_hash does not match the prior entry"));
            }
            let recomputed = entry.compute_hash()?;
            if entry.current_hash.as_deref() != Some(recomputed.as_str()) {
                return Ok(broken(checked, &entry, "current_hash does not match recomputed hash"));
            }
            expected_prev = entry.current_hash.clone();
        }
    }

    Ok(IntegrityReport {
        valid: true,
        entries_checked: checked,
        first_broken_at: None,
        error: None,
    })
}

fn broken(checked: u64, entry: &DecisionTraceEntry, message: &str) -> IntegrityReport {
    IntegrityReport {
        valid: false,
        entries_checked: checked,
        first_broken_at: Some(entry.idempotency_key.clone()),
        error: Some(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str) -> DecisionTraceEntry {
        DecisionTraceEntry {
            session_id: "s1".to_string(),
            prompt_id: "p1".to_string(),
            timestamp: Utc::now(),
            policy_version: "1".to_string(),
            policy_hash: "abc123".to_string(),
            matched_rule: Some("r1".to_string()),
            evaluation_details: serde_json::json!({}),
            risk_level: "low".to_string(),
            confidence: "high".to_string(),
            action_taken: "auto_reply".to_string(),
            idempotency_key: key.to_string(),
            escalation_status: None,
            human_actor: None,
            ci_status_snapshot: None,
            replay_safe: true,
            previous_hash: None,
            current_hash: None,
            trace_version: trace_version(),
        }
    }

    #[test]
    fn appended_entries_chain_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let writer = DecisionTraceWriter::new(&path);

        let first = writer.append(entry("k1")).unwrap();
        let second = writer.append(entry("k2")).unwrap();
        assert!(first.previous_hash.is_none());
        assert_eq!(second.previous_hash, first.current_hash);

        let report = verify_chain(&path).unwrap();
        assert!(report.valid);
        assert_eq!(report.entries_checked, 2);
    }

    #[test]
    fn tampered_line_breaks_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let writer = DecisionTraceWriter::new(&path);
        writer.append(entry("k1")).unwrap();

        let mut bad = entry("k1");
        bad.current_hash = Some("not-a-real-hash".to_string());
        std::fs::write(&path, format!("{}\n", serde_json::to_string(&bad).unwrap())).unwrap();

        let report = verify_chain(&path).unwrap();
        assert!(!report.valid);
    }
}
