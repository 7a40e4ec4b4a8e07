use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relaybridge", version, about = "Supervises an interactive CLI agent and routes its prompts to a human over chat")]
pub struct Cli {
    /// Path to relaybridge.toml. Defaults to ~/.relaybridge/relaybridge.toml.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Named profile under ~/.relaybridge/profiles/<name>.toml.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch `tool` under supervision.
    Run {
        tool: String,
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
        /// Evaluate policy and log decisions without ever touching the child's stdin.
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect and control supervised sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// One-shot summary of configuration, channels, and database health.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Deeper self-check: config validity, channel reachability, DB integrity.
    Doctor {
        #[arg(long)]
        json: bool,
    },

    /// Print the binary's version.
    Version {
        #[arg(long)]
        json: bool,
    },

    /// Inspect or maintain the SQLite database.
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Validate, test, or migrate a policy file.
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Manage named configuration profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// List built-in tool adapters.
    Adapter {
        #[command(subcommand)]
        action: AdapterAction,
    },

    /// Diagnostic bundle for support.
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    List {
        #[arg(long)]
        json: bool,
    },
    Show {
        session_id: String,
        #[arg(long)]
        json: bool,
    },
    Trace {
        session_id: String,
        #[arg(long)]
        json: bool,
    },
    Pause {
        session_id: String,
    },
    Resume {
        session_id: String,
    },
    Stop {
        session_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbAction {
    Info {
        #[arg(long)]
        json: bool,
    },
    Migrate,
    Archive {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PolicyAction {
    Validate {
        path: String,
    },
    Test {
        path: String,
        /// Inline evaluation event as JSON (tool_id, cwd, prompt_type, confidence, excerpt).
        #[arg(long)]
        event: String,
        #[arg(long)]
        explain: bool,
        #[arg(long)]
        debug: bool,
    },
    Coverage {
        path: String,
    },
    Migrate {
        path: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    List,
    Show {
        name: String,
    },
    Create {
        name: String,
        #[arg(long)]
        from: Option<String>,
    },
    Delete {
        name: String,
    },
    SetDefault { name: String },
}

#[derive(Subcommand, Debug)]
pub enum AdapterAction {
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DebugAction {
    Bundle {
        #[arg(long, default_value = "relaybridge-debug-bundle.tar.gz")]
        out: String,
    },
}
