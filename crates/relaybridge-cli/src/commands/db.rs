use std::path::Path;

use chrono::{Duration, Utc};
use relaybridge_audit::archive_audit_events;
use rusqlite::Connection;
use serde_json::json;

use crate::output::{emit, ExitCode};

/// Rows older than this many days are eligible for `db archive`.
const ARCHIVE_CUTOFF_DAYS: i64 = 90;

pub fn info(db_path: &str, json_out: bool) -> ExitCode {
    let conn = match Connection::open_with_flags(db_path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::OperationFailed;
        }
    };

    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap_or(0);
    let table_count = |name: &str| -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |r| r.get(0))
            .unwrap_or(0)
    };

    let report = json!({
        "path": db_path,
        "schema_version": user_version,
        "sessions": table_count("sessions"),
        "audit_events": table_count("audit_events"),
    });

    emit(&report, json_out, |v| {
        println!("db path:        {}", v["path"]);
        println!("schema version: {}", v["schema_version"]);
        println!("sessions:       {}", v["sessions"]);
        println!("audit_events:   {}", v["audit_events"]);
    });
    ExitCode::Success
}

/// Re-runs schema setup, which is forward-only and a no-op on an up-to-date db.
pub fn migrate(db_path: &str) -> ExitCode {
    match Connection::open(db_path).map_err(anyhow::Error::from).and_then(|conn| {
        relaybridge_sessions::db::init_db(&conn)?;
        Ok(())
    }) {
        Ok(()) => {
            println!("migrated {db_path}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}

pub fn archive(db_path: &str, dry_run: bool) -> ExitCode {
    let conn = match Connection::open(db_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::OperationFailed;
        }
    };
    let cutoff = Utc::now() - Duration::days(ARCHIVE_CUTOFF_DAYS);

    if dry_run {
        let eligible: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM audit_events WHERE created_at < ?1",
                [cutoff.to_rfc3339()],
                |r| r.get(0),
            )
            .unwrap_or(0);
        println!("would archive {eligible} events older than {}", cutoff.to_rfc3339());
        return ExitCode::Success;
    }

    match archive_audit_events(&conn, Path::new(db_path), cutoff) {
        Ok(moved) => {
            println!("archived {moved} events older than {}", cutoff.to_rfc3339());
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}
