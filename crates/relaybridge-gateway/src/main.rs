#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use rusqlite::{Connection, OpenFlags};
use tracing::info;

use relaybridge_capabilities::{require_capability, AuthorityMode, Edition};
use relaybridge_sessions::SessionManager;

mod app;
mod error;
mod http;

/// Read-only local dashboard for a supervised agent's sessions and audit log.
#[derive(Parser, Debug)]
#[command(name = "relaybridge-gateway", version)]
struct Cli {
    /// Address to bind the dashboard HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to bind the dashboard HTTP server to.
    #[arg(long, default_value_t = 8787)]
    port: u16,

    /// Path to the sessions SQLite database.
    #[arg(long, default_value = "relaybridge_sessions.db")]
    sessions_db: String,

    /// Path to the hash-chained audit SQLite database, opened read-only.
    #[arg(long, default_value = "relaybridge_audit.db")]
    audit_db: String,

    /// Allow binding to a non-loopback address. Off by default: the
    /// dashboard carries no auth layer of its own. Gated behind
    /// `authority.non_loopback_bind` — requires `--edition enterprise
    /// --authority-mode write-enabled`.
    #[arg(long)]
    allow_non_loopback: bool,

    /// License edition this dashboard is running under.
    #[arg(long, default_value = "core")]
    edition: String,

    /// Authority mode this dashboard is running under.
    #[arg(long, default_value = "readonly")]
    authority_mode: String,
}

fn parse_edition(raw: &str) -> anyhow::Result<Edition> {
    match raw {
        "core" => Ok(Edition::Core),
        "enterprise" => Ok(Edition::Enterprise),
        other => bail!("unknown edition {other:?} — expected core|enterprise"),
    }
}

fn parse_authority_mode(raw: &str) -> anyhow::Result<AuthorityMode> {
    match raw {
        "readonly" => Ok(AuthorityMode::Readonly),
        "write-enabled" => Ok(AuthorityMode::WriteEnabled),
        other => bail!("unknown authority mode {other:?} — expected readonly|write-enabled"),
    }
}

fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaybridge_gateway=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let edition = parse_edition(&cli.edition)?;
    let authority_mode = parse_authority_mode(&cli.authority_mode)?;

    if !is_loopback_host(&cli.bind) {
        if !cli.allow_non_loopback {
            bail!(
                "refusing to bind dashboard to non-loopback address {} without --allow-non-loopback",
                cli.bind
            );
        }
        require_capability(edition, authority_mode, "authority.non_loopback_bind", None)
            .context("non-loopback dashboard bind requires --edition enterprise --authority-mode write-enabled")?;
    }

    let sessions_conn = Connection::open(&cli.sessions_db)
        .with_context(|| format!("opening sessions db at {}", cli.sessions_db))?;
    let sessions = SessionManager::new(sessions_conn).context("initializing sessions db")?;

    let audit_conn = Connection::open_with_flags(
        &cli.audit_db,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("opening audit db read-only at {}", cli.audit_db))?;

    let state = Arc::new(app::AppState::new(sessions, audit_conn, edition));
    let router = app::build_router(state);

    let addr = format!("{}:{}", cli.bind, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding dashboard listener to {addr}"))?;
    info!("relaybridge dashboard listening on {}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_hosts_are_recognized() {
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("::1"));
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("LOCALHOST"));
    }

    #[test]
    fn non_loopback_hosts_are_rejected() {
        assert!(!is_loopback_host("0.0.0.0"));
        assert!(!is_loopback_host("10.0.0.5"));
        assert!(!is_loopback_host("example.com"));
    }

    #[test]
    fn edition_and_authority_mode_parse_known_values() {
        assert_eq!(parse_edition("core").unwrap(), Edition::Core);
        assert_eq!(parse_edition("enterprise").unwrap(), Edition::Enterprise);
        assert_eq!(parse_authority_mode("readonly").unwrap(), AuthorityMode::Readonly);
        assert_eq!(parse_authority_mode("write-enabled").unwrap(), AuthorityMode::WriteEnabled);
    }

    #[test]
    fn unknown_edition_or_authority_mode_is_rejected() {
        assert!(parse_edition("pro").is_err());
        assert!(parse_authority_mode("admin").is_err());
    }

    #[test]
    fn core_edition_cannot_satisfy_non_loopback_bind_capability() {
        let result = require_capability(Edition::Core, AuthorityMode::WriteEnabled, "authority.non_loopback_bind", None);
        assert!(result.is_err());
    }

    #[test]
    fn enterprise_write_enabled_satisfies_non_loopback_bind_capability() {
        let result = require_capability(Edition::Enterprise, AuthorityMode::WriteEnabled, "authority.non_loopback_bind", None);
        assert!(result.is_ok());
    }
}
