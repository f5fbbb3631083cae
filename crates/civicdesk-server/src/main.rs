//! civicdesk
//!
//! Administrative command line for the civic issue desk. Every core
//! operation is reachable from here against the local SQLite database.

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use civicdesk_core::config::load_config;
use civicdesk_core::tracing_init::init_tracing;

use civicdesk_server::app::App;
use civicdesk_server::cli::account_cmd::{self, SignupArgs};
use civicdesk_server::cli::admin_cmd::{self, AdminAction};
use civicdesk_server::cli::profile_cmd::{self, ProfileAction};
use civicdesk_server::cli::report_cmd::{self, ReportAction};
use civicdesk_server::cli::TokenArg;

#[derive(Parser, Debug)]
#[command(name = "civicdesk")]
#[command(version, about = "Civic issue desk - accounts, reports and administration")]
struct Args {
    /// JSON config file layered over the global settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Session token signing secret.
    #[arg(long, global = true, env = "CIVICDESK_TOKEN_SECRET", hide_env_values = true)]
    token_secret: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new account and send its verification email.
    Signup(SignupArgs),
    /// Verify an email address with the token from the verification email.
    Verify { token: String },
    /// Sign in and print a session token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CIVICDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the identity behind a session token.
    Whoami {
        #[command(flatten)]
        auth: TokenArg,
    },
    /// Citizen issue reports.
    #[command(subcommand)]
    Report(ReportAction),
    /// Administrator operations.
    #[command(subcommand)]
    Admin(AdminAction),
    /// The caller's own profile.
    #[command(subcommand)]
    Profile(ProfileAction),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.storage.database_path = Some(path);
    }
    if let Some(secret) = args.token_secret {
        config.auth.token_secret = Some(secret);
    }

    let default_filter = config
        .log_level
        .as_deref()
        .map_or_else(
            || "civicdesk=info,civicdesk_server=info,civicdesk_core=info".to_string(),
            |level| format!("civicdesk={level},civicdesk_server={level},civicdesk_core={level}"),
        );
    init_tracing(&default_filter, args.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting civicdesk");

    let app = App::from_config(&config).await?;
    let mut out = io::stdout();

    let result = match args.command {
        Command::Signup(signup) => account_cmd::signup(&app, signup, &mut out).await,
        Command::Verify { token } => account_cmd::verify(&app, &token, &mut out).await,
        Command::Login { email, password } => {
            account_cmd::login(&app, &email, &password, &mut out).await
        }
        Command::Whoami { auth } => account_cmd::whoami(&app, &auth.token, &mut out).await,
        Command::Report(action) => report_cmd::run(action, &app, &mut out).await,
        Command::Admin(action) => admin_cmd::run(action, &app, &mut out).await,
        Command::Profile(action) => profile_cmd::run(action, &app, &mut out).await,
    };

    app.shutdown().await;
    result
}
