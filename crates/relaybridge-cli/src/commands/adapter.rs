use serde_json::json;

use crate::output::{emit, ExitCode};

/// Built-in tool adapters. Kept as a static list alongside
/// `relaybridge_pty::adapter::resolve_adapter`'s match arms — any tool not
/// named here falls back to the generic adapter at runtime.
const ADAPTERS: &[(&str, &str)] = &[
    ("generic", "verbatim value + optional trailing CR"),
    ("claude-code", "trims trailing whitespace before injecting"),
];

pub fn list(json_out: bool) -> ExitCode {
    let rows: Vec<_> = ADAPTERS
        .iter()
        .map(|(name, desc)| json!({ "name": name, "description": desc }))
        .collect();
    emit(&json!({ "adapters": rows }), json_out, |_| {
        for (name, desc) in ADAPTERS {
            println!("{name:<12} {desc}");
        }
    });
    ExitCode::Success
}
