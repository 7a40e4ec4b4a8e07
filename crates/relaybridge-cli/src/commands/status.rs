use relaybridge_core::config::RelaybridgeConfig;
use rusqlite::Connection;
use serde_json::json;

use crate::output::{emit, ExitCode};

pub fn run(config: &RelaybridgeConfig, json_out: bool) -> ExitCode {
    let db_reachable = Connection::open_with_flags(
        &config.database.path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )
    .is_ok();

    let channels = json!({
        "telegram": config.channels.telegram.is_some(),
        "slack": config.channels.slack.is_some(),
    });

    let report = json!({
        "database_path": config.database.path,
        "database_reachable": db_reachable,
        "channels": channels,
        "dashboard_enabled": config.dashboard.enabled,
        "policy_path": config.policy.path,
        "prompt_timeout_seconds": config.prompts.timeout_seconds,
    });

    emit(&report, json_out, |v| {
        println!("database:  {} (reachable: {})", v["database_path"], v["database_reachable"]);
        println!("channels:  telegram={} slack={}", v["channels"]["telegram"], v["channels"]["slack"]);
        println!("dashboard: enabled={}", v["dashboard_enabled"]);
        println!("policy:    {}", v["policy_path"]);
    });

    ExitCode::Success
}
