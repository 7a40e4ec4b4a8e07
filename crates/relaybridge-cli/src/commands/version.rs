use serde_json::json;

use crate::output::{emit, ExitCode};

pub fn run(json_out: bool) -> ExitCode {
    let version = env!("CARGO_PKG_VERSION");
    emit(&json!({ "version": version }), json_out, |_| {
        println!("relaybridge {version}");
    });
    ExitCode::Success
}
