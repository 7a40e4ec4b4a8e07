use relaybridge_core::config::RelaybridgeConfig;
use rusqlite::Connection;
use serde_json::json;

use crate::output::{emit, ExitCode};

struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

/// Deeper self-check than `status`: validates config, probes the database,
/// and — unlike `status` — treats any failing check as exit code 1.
pub fn run(config_path: Option<&str>, json_out: bool) -> ExitCode {
    let mut checks = Vec::new();

    let config = RelaybridgeConfig::load(config_path);
    checks.push(Check {
        name: "config_loads",
        ok: config.is_ok(),
        detail: config.as_ref().err().map(|e| e.to_string()).unwrap_or_else(|| "ok".to_string()),
    });

    if let Ok(config) = &config {
        let db_ok = Connection::open_with_flags(
            &config.database.path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .is_ok();
        checks.push(Check {
            name: "database_reachable",
            ok: db_ok,
            detail: config.database.path.clone(),
        });

        let has_channel = config.channels.telegram.is_some() || config.channels.slack.is_some();
        checks.push(Check {
            name: "channel_configured",
            ok: has_channel,
            detail: if has_channel { "ok".to_string() } else { "no channel configured".to_string() },
        });

        if let Some(policy_path) = &config.policy.path {
            let errors = relaybridge_policy::validate_policy_file(policy_path);
            checks.push(Check {
                name: "policy_valid",
                ok: errors.is_empty(),
                detail: if errors.is_empty() { "ok".to_string() } else { errors.join("; ") },
            });
        }
    }

    let all_ok = checks.iter().all(|c| c.ok);
    let rows: Vec<_> = checks
        .iter()
        .map(|c| json!({ "check": c.name, "ok": c.ok, "detail": c.detail }))
        .collect();

    emit(&json!({ "ok": all_ok, "checks": rows }), json_out, |_| {
        for check in &checks {
            println!("[{}] {} — {}", if check.ok { "ok" } else { "FAIL" }, check.name, check.detail);
        }
    });

    if all_ok {
        ExitCode::Success
    } else {
        ExitCode::OperationFailed
    }
}
