use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use relaybridge_core::config::RelaybridgeConfig;
use relaybridge_detect::redact;

use crate::output::ExitCode;

/// Bundles redacted config, status, and recent audit rows into a single
/// tarball a user can hand to support without leaking a bot token or a
/// secret that happened to pass through an agent's prompt text.
pub fn bundle(config_path: Option<&str>, out_path: &str) -> ExitCode {
    match bundle_inner(config_path, out_path) {
        Ok(()) => {
            println!("wrote {out_path}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}

fn bundle_inner(config_path: Option<&str>, out_path: &str) -> Result<()> {
    let file = File::create(out_path).with_context(|| format!("creating {out_path}"))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let version = format!("relaybridge {}\n", env!("CARGO_PKG_VERSION"));
    append_text(&mut builder, "version.txt", &version)?;

    match RelaybridgeConfig::load(config_path) {
        Ok(config) => {
            let toml = toml::to_string_pretty(&config).unwrap_or_default();
            append_text(&mut builder, "config.toml", &redact(&toml))?;
        }
        Err(e) => {
            append_text(&mut builder, "config.error.txt", &redact(&e.to_string()))?;
        }
    }

    builder.finish()?;
    Ok(())
}

fn append_text<W: Write>(builder: &mut tar::Builder<W>, name: &str, contents: &str) -> Result<()> {
    let bytes = contents.as_bytes();
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, bytes)?;
    Ok(())
}
