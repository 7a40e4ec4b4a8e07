use anyhow::{bail, Context, Result};

use crate::config::profiles_dir;
use crate::output::ExitCode;

fn list_profile_names() -> Result<Vec<String>> {
    let dir = profiles_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        if let Some(name) = entry.path().file_stem().and_then(|s| s.to_str()) {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("toml") {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

pub fn list() -> ExitCode {
    match list_profile_names() {
        Ok(names) if names.is_empty() => {
            println!("no profiles configured");
            ExitCode::Success
        }
        Ok(names) => {
            for name in names {
                println!("{name}");
            }
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}

pub fn show(name: &str) -> ExitCode {
    let path = crate::config::profile_path(name);
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            print!("{contents}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error reading profile '{name}': {e}");
            ExitCode::OperationFailed
        }
    }
}

pub fn create(name: &str, from: Option<&str>) -> ExitCode {
    match create_inner(name, from) {
        Ok(()) => {
            println!("created profile '{name}'");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}

fn create_inner(name: &str, from: Option<&str>) -> Result<()> {
    let dir = profiles_dir();
    std::fs::create_dir_all(&dir)?;
    let dest = crate::config::profile_path(name);
    if dest.exists() {
        bail!("profile '{name}' already exists");
    }
    let contents = match from {
        Some(src_path) => std::fs::read_to_string(src_path)
            .with_context(|| format!("reading source config {src_path}"))?,
        None => DEFAULT_PROFILE_TEMPLATE.to_string(),
    };
    std::fs::write(&dest, contents)?;
    Ok(())
}

pub fn delete(name: &str) -> ExitCode {
    let path = crate::config::profile_path(name);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            println!("deleted profile '{name}'");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error deleting profile '{name}': {e}");
            ExitCode::OperationFailed
        }
    }
}

pub fn set_default(name: &str) -> ExitCode {
    let profile_path = crate::config::profile_path(name);
    if !profile_path.exists() {
        eprintln!("error: profile '{name}' does not exist");
        return ExitCode::OperationFailed;
    }
    let default_path = crate::config::default_config_path();
    match std::fs::copy(&profile_path, &default_path) {
        Ok(_) => {
            println!("'{name}' is now the default profile");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}

const DEFAULT_PROFILE_TEMPLATE: &str = r#"[database]
path = "~/.relaybridge/relaybridge.db"

[prompts]
timeout_seconds = 300
stuck_timeout_seconds = 120

# [channels.telegram]
# bot_token = "123456789:AAExxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"
# allowed_user_ids = []
"#;
