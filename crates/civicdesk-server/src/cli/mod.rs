//! `civicdesk` subcommands.
//!
//! Every command writes one JSON document to the supplied writer. Commands
//! that act on behalf of a user take a session token, with or without the
//! `Bearer ` prefix.

pub mod account_cmd;
pub mod admin_cmd;
pub mod profile_cmd;
pub mod report_cmd;

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use civicdesk_core::AuthContext;

use crate::app::App;

/// Session token argument shared by protected subcommands.
#[derive(clap::Args, Debug, Clone)]
pub struct TokenArg {
    /// Session token from `civicdesk login` (a `Bearer ` prefix is accepted).
    #[arg(long, env = "CIVICDESK_TOKEN", hide_env_values = true)]
    pub token: String,
}

/// Resolve a token argument into the calling identity.
pub async fn authorize(app: &App, token: &str) -> anyhow::Result<AuthContext> {
    let token = token.trim();
    let ctx = if token.starts_with("Bearer ") {
        app.sessions.resolve_bearer(token).await?
    } else {
        app.sessions.resolve_token(token).await?
    };
    Ok(ctx)
}

pub fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub async fn read_image(path: Option<&Path>) -> anyhow::Result<Option<Vec<u8>>> {
    match path {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            Ok(Some(bytes))
        }
        None => Ok(None),
    }
}
