#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod cli;
mod commands;
mod config;
mod output;
mod supervisor;

use clap::Parser;

use cli::{AdapterAction, Cli, Command, DbAction, DebugAction, PolicyAction, ProfileAction, SessionsAction};
use output::ExitCode;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "relaybridge=info".into()))
        .init();

    let cli = Cli::parse();
    let code = dispatch(cli).await;
    std::process::exit(code.code());
}

async fn dispatch(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run { tool, args, dry_run } => run_supervised(cli.config.as_deref(), cli.profile.as_deref(), tool, args, dry_run).await,

        Command::Sessions { action } => dispatch_sessions(cli.config.as_deref(), cli.profile.as_deref(), action),

        Command::Status { json } => match config::resolve_config(cli.config.as_deref(), cli.profile.as_deref()) {
            Ok(cfg) => commands::status::run(&cfg, json),
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::Misconfiguration
            }
        },

        Command::Doctor { json } => commands::doctor::run(cli.config.as_deref(), json),

        Command::Version { json } => commands::version::run(json),

        Command::Db { action } => dispatch_db(cli.config.as_deref(), cli.profile.as_deref(), action),

        Command::Policy { action } => dispatch_policy(action),

        Command::Profile { action } => dispatch_profile(action),

        Command::Adapter { action } => match action {
            AdapterAction::List { json } => commands::adapter::list(json),
        },

        Command::Debug { action } => match action {
            DebugAction::Bundle { out } => commands::debug::bundle(cli.config.as_deref(), &out),
        },
    }
}

async fn run_supervised(config_path: Option<&str>, profile: Option<&str>, tool: String, args: Vec<String>, dry_run: bool) -> ExitCode {
    let cfg = match config::resolve_config(config_path, profile) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::Misconfiguration;
        }
    };

    match supervisor::run(cfg, tool, args, dry_run).await {
        Ok(0) => ExitCode::Success,
        Ok(_) => ExitCode::OperationFailed,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}

fn dispatch_sessions(config_path: Option<&str>, profile: Option<&str>, action: SessionsAction) -> ExitCode {
    let cfg = match config::resolve_config(config_path, profile) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::Misconfiguration;
        }
    };
    let db_path = cfg.database.path.clone();

    match action {
        SessionsAction::List { json } => commands::sessions::list(&db_path, json),
        SessionsAction::Show { session_id, json } => commands::sessions::show(&db_path, &session_id, json),
        SessionsAction::Trace { session_id, json } => commands::sessions::trace(&db_path, &session_id, json),
        SessionsAction::Pause { session_id } => commands::sessions::pause(&db_path, &session_id),
        SessionsAction::Resume { session_id } => commands::sessions::resume(&db_path, &session_id),
        SessionsAction::Stop { session_id } => commands::sessions::stop(&db_path, &session_id),
    }
}

fn dispatch_db(config_path: Option<&str>, profile: Option<&str>, action: DbAction) -> ExitCode {
    let cfg = match config::resolve_config(config_path, profile) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::Misconfiguration;
        }
    };
    let db_path = cfg.database.path.clone();

    match action {
        DbAction::Info { json } => commands::db::info(&db_path, json),
        DbAction::Migrate => commands::db::migrate(&db_path),
        DbAction::Archive { dry_run } => commands::db::archive(&db_path, dry_run),
    }
}

fn dispatch_policy(action: PolicyAction) -> ExitCode {
    match action {
        PolicyAction::Validate { path } => commands::policy::validate(&path, false),
        PolicyAction::Test { path, event, explain, debug } => commands::policy::test(&path, &event, explain, debug, false),
        PolicyAction::Coverage { path } => commands::policy::coverage(&path, false),
        PolicyAction::Migrate { path } => commands::policy::migrate(&path),
    }
}

fn dispatch_profile(action: ProfileAction) -> ExitCode {
    match action {
        ProfileAction::List => commands::profile::list(),
        ProfileAction::Show { name } => commands::profile::show(&name),
        ProfileAction::Create { name, from } => commands::profile::create(&name, from.as_deref()),
        ProfileAction::Delete { name } => commands::profile::delete(&name),
        ProfileAction::SetDefault { name } => commands::profile::set_default(&name),
    }
}
