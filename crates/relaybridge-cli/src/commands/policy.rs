use relaybridge_policy::{
    debug_evaluate, detect_overlaps, evaluate, explain, load_policy, migrate_v0_to_v1,
    validate_policy_file, EvalEvent,
};
use serde_json::json;

use crate::output::{emit, ExitCode};

pub fn validate(path: &str, json_out: bool) -> ExitCode {
    let errors = validate_policy_file(path);
    let ok = errors.is_empty();
    emit(&json!({ "ok": ok, "errors": errors }), json_out, |_| {
        if ok {
            println!("{path}: valid");
        } else {
            for e in &errors {
                println!("{path}: {e}");
            }
        }
    });
    if ok {
        ExitCode::Success
    } else {
        ExitCode::Misconfiguration
    }
}

/// `event` is a JSON object shaped like [`EvalEvent`]'s owned fields; string
/// `prompt_type`/`confidence` values are parsed the same as the policy YAML's own.
pub fn test(path: &str, event_json: &str, explain_flag: bool, debug_flag: bool, json_out: bool) -> ExitCode {
    let policy = match load_policy(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error loading policy: {e}");
            return ExitCode::Misconfiguration;
        }
    };

    let parsed: serde_json::Value = match serde_json::from_str(event_json) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error parsing --event: {e}");
            return ExitCode::Misconfiguration;
        }
    };

    let tool_id = parsed["tool_id"].as_str().unwrap_or("generic");
    let cwd = parsed["cwd"].as_str().unwrap_or("/");
    let excerpt = parsed["excerpt"].as_str().unwrap_or("");
    let prompt_type = match serde_json::from_value(parsed["prompt_type"].clone()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: invalid prompt_type: {e}");
            return ExitCode::Misconfiguration;
        }
    };
    let confidence = match serde_json::from_value(parsed["confidence"].clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: invalid confidence: {e}");
            return ExitCode::Misconfiguration;
        }
    };

    let event = EvalEvent {
        tool_id,
        cwd,
        prompt_type,
        confidence,
        excerpt,
        session_tag: None,
        session_state: None,
        channel_message: false,
        environment: None,
    };

    if debug_flag {
        let trace = debug_evaluate(&policy, &event);
        emit(&json!({ "trace": trace }), json_out, |v| println!("{v:#}"));
        return ExitCode::Success;
    }

    let decision = if explain_flag { explain(&policy, &event) } else { evaluate(&policy, &event) };
    match decision {
        Ok(d) => {
            emit(&json!(d), json_out, |v| println!("{v:#}"));
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}

pub fn coverage(path: &str, json_out: bool) -> ExitCode {
    let policy = match load_policy(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::Misconfiguration;
        }
    };
    let warnings = detect_overlaps(&policy);
    let ok = warnings.is_empty();
    emit(&json!({ "ok": ok, "warnings": warnings }), json_out, |v| {
        if ok {
            println!("{path}: no overlapping rules");
        } else {
            println!("{}", v["warnings"]);
        }
    });
    ExitCode::Success
}

pub fn migrate(path: &str) -> ExitCode {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error reading {path}: {e}");
            return ExitCode::OperationFailed;
        }
    };
    match migrate_v0_to_v1(&raw) {
        Ok(migrated) => {
            println!("{migrated}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error migrating {path}: {e}");
            ExitCode::OperationFailed
        }
    }
}
